//! gRPC adapters for the counter and event services.
//!
//! Translates between the protobuf messages and the domain model and maps
//! service errors onto gRPC status codes. No business logic lives here.

use chrono::{DateTime, Utc};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::model::{Counter, Event};
use crate::proto::{
    counter_service_server::CounterService as CounterServiceTrait,
    event_service_server::EventService as EventServiceTrait, Counter as ProtoCounter,
    CounterServiceCreateRequest, CounterServiceCreateResponse, CounterServiceDeleteRequest,
    CounterServiceDeleteResponse, CounterServiceGetRequest, CounterServiceGetResponse,
    CounterServiceIncrementRequest, CounterServiceIncrementResponse, CounterServiceListRequest,
    CounterServiceListResponse, Event as ProtoEvent, EventServiceListRequest,
    EventServiceListResponse,
};
use crate::services::{CounterService, EventService, ServiceError};

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidArgument(msg) => Status::invalid_argument(msg),
            e @ ServiceError::NotFound { .. } => Status::not_found(e.to_string()),
            e @ ServiceError::StoreUnavailable(_) => Status::unavailable(e.to_string()),
        }
    }
}

fn to_timestamp(instant: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: instant.timestamp(),
        nanos: i32::try_from(instant.timestamp_subsec_nanos()).unwrap_or(i32::MAX),
    }
}

fn to_duration(duration: std::time::Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
        nanos: i32::try_from(duration.subsec_nanos()).unwrap_or(i32::MAX),
    }
}

impl From<Counter> for ProtoCounter {
    fn from(counter: Counter) -> Self {
        ProtoCounter {
            id: counter.id,
            title: counter.title,
            count: counter.count,
            timestamp: Some(to_timestamp(counter.timestamp)),
        }
    }
}

impl From<Event> for ProtoEvent {
    fn from(event: Event) -> Self {
        ProtoEvent {
            id: event.id,
            title: event.title,
            counter_id: event.counter_id,
            duration: event.duration.map(to_duration),
            created_at: Some(to_timestamp(event.created_at)),
        }
    }
}

/// gRPC binding of [`CounterService`].
pub struct CounterGrpc {
    service: CounterService,
}

impl CounterGrpc {
    pub fn new(service: CounterService) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl CounterServiceTrait for CounterGrpc {
    async fn create(
        &self,
        request: Request<CounterServiceCreateRequest>,
    ) -> Result<Response<CounterServiceCreateResponse>, Status> {
        let req = request.into_inner();
        let (counter, event) = self.service.create(&req.title, &req.event_title).await?;
        Ok(Response::new(CounterServiceCreateResponse {
            counter: Some(counter.into()),
            event: Some(event.into()),
        }))
    }

    async fn get(
        &self,
        request: Request<CounterServiceGetRequest>,
    ) -> Result<Response<CounterServiceGetResponse>, Status> {
        let req = request.into_inner();
        let counter = self.service.get(&req.id).await?;
        Ok(Response::new(CounterServiceGetResponse {
            counter: Some(counter.into()),
        }))
    }

    async fn list(
        &self,
        _request: Request<CounterServiceListRequest>,
    ) -> Result<Response<CounterServiceListResponse>, Status> {
        let counters = self.service.list().await?;
        info!(counters = counters.len(), "List counters");
        Ok(Response::new(CounterServiceListResponse {
            counters: counters.into_iter().map(Into::into).collect(),
        }))
    }

    async fn increment(
        &self,
        request: Request<CounterServiceIncrementRequest>,
    ) -> Result<Response<CounterServiceIncrementResponse>, Status> {
        let req = request.into_inner();
        let (counter, event) = self.service.increment(&req.id, &req.title).await?;
        Ok(Response::new(CounterServiceIncrementResponse {
            counter: Some(counter.into()),
            event: Some(event.into()),
        }))
    }

    async fn delete(
        &self,
        request: Request<CounterServiceDeleteRequest>,
    ) -> Result<Response<CounterServiceDeleteResponse>, Status> {
        let req = request.into_inner();
        self.service.delete(&req.id).await?;
        Ok(Response::new(CounterServiceDeleteResponse { id: req.id }))
    }
}

/// gRPC binding of [`EventService`].
pub struct EventGrpc {
    service: EventService,
}

impl EventGrpc {
    pub fn new(service: EventService) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl EventServiceTrait for EventGrpc {
    async fn list(
        &self,
        request: Request<EventServiceListRequest>,
    ) -> Result<Response<EventServiceListResponse>, Status> {
        let req = request.into_inner();
        let events = self.service.list(&req.counter_id).await?;
        Ok(Response::new(EventServiceListResponse {
            events: events.into_iter().map(Into::into).collect(),
        }))
    }
}
