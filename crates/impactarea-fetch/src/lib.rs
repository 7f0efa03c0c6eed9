//! Impactarea Fetch - Remote data access for the impacted area processor
//!
//! Session handling against the identity server, the geosys imagery client
//! and a STAC catalog reader that builds index time series from GeoTIFF
//! assets.

pub mod auth;
pub mod geosys;
pub mod stac;

pub use auth::{GeosysCredentials, IdentityClient, SessionToken, TokenValidator};
pub use geosys::GeosysClient;
pub use stac::{StacClient, StacClientOptions, StacTimeSeriesSource};
