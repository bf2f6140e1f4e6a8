//! Backend transport and the dispatch orchestrator that walks an endpoint
//! chain until one endpoint returns a well-formed payload.

pub mod dispatcher;
pub mod http_transport;
pub mod transport;

pub use dispatcher::{
    AttemptOutcome, AttemptRecord, DispatchRequest, DispatchSettings, Dispatched, Dispatcher,
};
pub use http_transport::HttpTransport;
pub use transport::{BackendRequest, Transport, TransportError};
pub use tokio_util::sync::CancellationToken;
