//! counters-server: gRPC server for duration-stamped counters
//!
//! ## Architecture
//! ```text
//! [Client] -> [CounterService / EventService] -> [Cache] (look-aside)
//!                            |
//!                            v
//!                     [Counter Store] (SQLite / PostgreSQL)
//! ```
//!
//! ## Configuration
//! - `--config <path>` or COUNTERS_CONFIG: YAML configuration file
//! - COUNTERS__<SECTION>__<KEY>: per-key overrides (e.g. COUNTERS__STORAGE__TYPE=postgres)
//! - DATABASE_URL: PostgreSQL URI
//! - REDIS_URL: Redis URL
//! - COUNTERS_LOG: tracing filter (default: info)

use std::sync::Arc;

use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tracing::{error, info};

use counters::cache::init_cache;
use counters::clock::SystemClock;
use counters::config::Config;
use counters::grpc::{CounterGrpc, EventGrpc};
use counters::proto::{
    counter_service_server::CounterServiceServer, event_service_server::EventServiceServer,
};
use counters::services::{CounterService, EventService};
use counters::storage::init_storage;
use counters::transport::{self, grpc_trace_layer, Listener};
use counters::utils::bootstrap::{init_tracing, parse_config_path, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path(std::env::args());
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let store = init_storage(&config.storage, Arc::new(SystemClock))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to initialize storage");
            e
        })?;

    let cache = init_cache(&config.cache).await.map_err(|e| {
        error!(error = %e, "Failed to initialize cache");
        e
    })?;

    let counter_service = CounterService::new(store.clone(), cache.clone());
    let event_service = EventService::new(store, cache);

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<CounterServiceServer<CounterGrpc>>()
        .await;
    health_reporter
        .set_serving::<EventServiceServer<EventGrpc>>()
        .await;
    health_reporter
        .set_service_status("", tonic_health::ServingStatus::Serving)
        .await;

    let router = Server::builder()
        .layer(grpc_trace_layer())
        .add_service(health_service)
        .add_service(CounterServiceServer::new(CounterGrpc::new(counter_service)))
        .add_service(EventServiceServer::new(EventGrpc::new(event_service)));

    info!("Counters server starting");

    match transport::bind(&config.transport)? {
        Listener::Tcp(addr) => router.serve_with_shutdown(addr, shutdown_signal()).await?,
        Listener::Uds { incoming, socket } => {
            router
                .serve_with_incoming_shutdown(incoming, shutdown_signal())
                .await?;
            drop(socket);
        }
    }

    info!("Counters server stopped");
    Ok(())
}
