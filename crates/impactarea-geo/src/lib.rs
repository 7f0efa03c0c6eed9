//! Impactarea Geo - Area validation, CRS, and raster/polygon operations
//!
//! This crate handles the geospatial side of impact computation: validating
//! the area of interest, measuring it on the ellipsoid, reprojecting it to the
//! imagery CRS, and burning it into a pixel grid.

pub mod models;
pub mod spatial;
pub mod transform;
pub mod validation;
