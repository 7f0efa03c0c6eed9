mod request;
mod response;

pub use request::{ImpactQuery, StacImpactRequest};
pub use response::HealthResponse;
