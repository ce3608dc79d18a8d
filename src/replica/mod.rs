//! Replica side: simulated work behind the query method, with best-effort
//! cancellation keyed by correlation id

pub mod http;
pub mod registry;
pub mod server;

pub use http::{create_router, ReplicaState};
pub use registry::{AcceptOutcome, CancelOutcome, Delivery, InFlightRequest, RequestRegistry};
pub use server::ReplicaServer;
