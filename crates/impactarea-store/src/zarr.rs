//! Zarr v2 chunked array store
//!
//! An impact result is written as a group with two `(y, x)` arrays,
//! `difference` (`<f8`) and `impacted` (`|b1`), optional `x`/`y` coordinate
//! arrays, and the run parameters in the group attributes. Chunks are
//! zlib-compressed and keyed with `.` separators.

pub mod array;
pub mod dataset;

pub use array::{decode_array, encode_array, ArrayMetadata, Element, EncodedArray};
pub use dataset::{chunk_keys, decode_impact, encode_impact, metadata_keys, StoredImpact};
