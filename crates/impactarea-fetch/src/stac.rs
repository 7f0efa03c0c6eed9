//! STAC catalog access

pub mod client;
pub mod models;
pub mod raster;
pub mod source;

pub use client::{AssetBytes, StacClient, StacClientOptions};
pub use models::{RasterBand, StacAsset, StacItem, StacItemCollection, StacLink, StacSearchParams};
pub use source::StacTimeSeriesSource;
