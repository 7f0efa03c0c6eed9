//! Port trait definitions
//!
//! These traits define the interfaces that imagery adapters must implement.

pub mod source;

pub use source::{ImageryCatalog, TimeSeriesSource};
