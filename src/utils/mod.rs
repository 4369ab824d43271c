//! Process-level helpers shared by the binary and the backends.

pub mod bootstrap;
pub mod retry;
