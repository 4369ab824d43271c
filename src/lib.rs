//! Counters - duration-stamped counters over a transactional store
//!
//! Each counter keeps a count and a log of events; every increment records
//! the time elapsed since the previous event. A look-aside cache sits in
//! front of the store and is only ever written after the store commits.

pub mod cache;
pub mod clock;
pub mod config;
pub mod grpc;
pub mod model;
pub mod services;
pub mod storage;
pub mod transport;
pub mod utils;

pub mod proto {
    tonic::include_proto!("counters.v1");
}
