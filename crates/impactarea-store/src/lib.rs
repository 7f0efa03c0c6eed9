//! Impactarea Store - Chunked array stores and their storage backends
//!
//! This crate writes impact results as Zarr v2 stores and uploads them to
//! object storage (S3, Azure Blob Storage, local filesystem or memory).

pub mod azure;
pub mod exporter;
pub mod local;
pub mod memory;
pub mod ports;
pub mod providers;
pub mod s3;
pub mod zarr;

pub use exporter::{store_name, Exporter};
pub use ports::ObjectStore;
pub use providers::{check_credentials, open_store, resolve_bucket, StoreSettings};
pub use zarr::StoredImpact;
