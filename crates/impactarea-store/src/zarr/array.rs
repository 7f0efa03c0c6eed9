//! Zarr v2 array metadata and chunk codec

use std::collections::HashMap;
use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use impactarea_core::error::{ImpactError, Result};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

pub const ZARR_FORMAT: u8 = 2;

/// zlib level used for chunks
pub const COMPRESSION_LEVEL: u32 = 1;

/// `.zarray` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub zarr_format: u8,
    pub shape: Vec<usize>,
    pub chunks: Vec<usize>,
    pub dtype: String,
    pub compressor: Option<Compressor>,
    pub fill_value: serde_json::Value,
    pub order: String,
    pub filters: Option<Vec<serde_json::Value>>,
    #[serde(default = "default_separator")]
    pub dimension_separator: String,
}

fn default_separator() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compressor {
    pub id: String,
    pub level: u32,
}

impl ArrayMetadata {
    /// Number of chunks along each dimension
    pub fn chunk_grid(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(len, chunk)| len.div_ceil(*chunk))
            .collect()
    }

    /// Keys of every chunk, relative to the array directory
    pub fn chunk_keys(&self) -> Vec<String> {
        grid_positions(&self.chunk_grid())
            .into_iter()
            .map(|position| chunk_key(&position, &self.dimension_separator))
            .collect()
    }

    fn chunk_len(&self) -> usize {
        self.chunks.iter().product()
    }
}

/// Element types the store knows how to write
pub trait Element: Copy {
    const DTYPE: &'static str;
    const SIZE: usize;

    fn fill() -> Self;
    fn fill_json() -> serde_json::Value;
    fn write_le(&self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

impl Element for f64 {
    const DTYPE: &'static str = "<f8";
    const SIZE: usize = 8;

    fn fill() -> Self {
        f64::NAN
    }

    /// Zarr v2 spells non-finite fill values as strings
    fn fill_json() -> serde_json::Value {
        serde_json::Value::String("NaN".to_string())
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        f64::from_le_bytes(buf)
    }
}

impl Element for bool {
    const DTYPE: &'static str = "|b1";
    const SIZE: usize = 1;

    fn fill() -> Self {
        false
    }

    fn fill_json() -> serde_json::Value {
        serde_json::Value::Bool(false)
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Metadata plus compressed chunks keyed like `0.1`
#[derive(Debug, Clone)]
pub struct EncodedArray {
    pub metadata: ArrayMetadata,
    pub chunks: Vec<(String, Vec<u8>)>,
}

/// Split `values` into chunks of at most `chunk_size` per dimension.
///
/// Edge chunks are padded with the fill value to the full chunk shape.
pub fn encode_array<T: Element>(values: &ArrayD<T>, chunk_size: usize) -> Result<EncodedArray> {
    if chunk_size == 0 {
        return Err(ImpactError::invalid_input("chunk_size", "must be at least 1"));
    }
    let shape = values.shape().to_vec();
    let chunks: Vec<usize> = shape.iter().map(|len| chunk_size.min(*len).max(1)).collect();
    let metadata = ArrayMetadata {
        zarr_format: ZARR_FORMAT,
        shape: shape.clone(),
        chunks: chunks.clone(),
        dtype: T::DTYPE.to_string(),
        compressor: Some(Compressor {
            id: "zlib".to_string(),
            level: COMPRESSION_LEVEL,
        }),
        fill_value: T::fill_json(),
        order: "C".to_string(),
        filters: None,
        dimension_separator: default_separator(),
    };

    let in_chunk = grid_positions(&chunks);
    let mut encoded = Vec::new();
    for chunk_position in grid_positions(&metadata.chunk_grid()) {
        let mut raw = Vec::with_capacity(metadata.chunk_len() * T::SIZE);
        for offset in &in_chunk {
            let global: Vec<usize> = chunk_position
                .iter()
                .zip(&chunks)
                .zip(offset)
                .map(|((c, size), o)| c * size + o)
                .collect();
            let value = if global.iter().zip(&shape).all(|(g, len)| g < len) {
                values[IxDyn(&global)]
            } else {
                T::fill()
            };
            value.write_le(&mut raw);
        }
        encoded.push((chunk_key(&chunk_position, &metadata.dimension_separator), compress(&raw)?));
    }

    Ok(EncodedArray { metadata, chunks: encoded })
}

/// Rebuild an array from its chunks; absent chunks read as the fill value
pub fn decode_array<T: Element>(
    metadata: &ArrayMetadata,
    chunks: &HashMap<String, Vec<u8>>,
) -> Result<ArrayD<T>> {
    if metadata.zarr_format != ZARR_FORMAT {
        return Err(corrupt(format!("unsupported zarr_format {}", metadata.zarr_format)));
    }
    if metadata.dtype != T::DTYPE {
        return Err(corrupt(format!("expected dtype {}, found {}", T::DTYPE, metadata.dtype)));
    }
    if metadata.order != "C" {
        return Err(corrupt("only C order is supported"));
    }
    if metadata.chunks.len() != metadata.shape.len() || metadata.chunks.contains(&0) {
        return Err(corrupt("chunk shape does not match array rank"));
    }

    let mut values = ArrayD::from_elem(IxDyn(&metadata.shape), T::fill());
    let in_chunk = grid_positions(&metadata.chunks);
    let expected_len = metadata.chunk_len() * T::SIZE;

    for chunk_position in grid_positions(&metadata.chunk_grid()) {
        let key = chunk_key(&chunk_position, &metadata.dimension_separator);
        let Some(stored) = chunks.get(&key) else {
            continue;
        };
        let raw = match &metadata.compressor {
            Some(c) if c.id == "zlib" => decompress(stored)?,
            Some(c) => return Err(corrupt(format!("unsupported compressor '{}'", c.id))),
            None => stored.clone(),
        };
        if raw.len() != expected_len {
            return Err(corrupt(format!(
                "chunk {} has {} bytes, expected {}",
                key,
                raw.len(),
                expected_len
            )));
        }

        for (i, offset) in in_chunk.iter().enumerate() {
            let global: Vec<usize> = chunk_position
                .iter()
                .zip(&metadata.chunks)
                .zip(offset)
                .map(|((c, size), o)| c * size + o)
                .collect();
            if global.iter().zip(&metadata.shape).all(|(g, len)| g < len) {
                values[IxDyn(&global)] = T::read_le(&raw[i * T::SIZE..(i + 1) * T::SIZE]);
            }
        }
    }

    Ok(values)
}

fn corrupt(reason: impl Into<String>) -> ImpactError {
    ImpactError::Serialization(format!("Invalid zarr array: {}", reason.into()))
}

fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

fn decompress(stored: &[u8]) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    ZlibDecoder::new(stored).read_to_end(&mut raw)?;
    Ok(raw)
}

fn chunk_key(position: &[usize], separator: &str) -> String {
    position
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Every index of a grid of the given extents, in C order
fn grid_positions(extents: &[usize]) -> Vec<Vec<usize>> {
    let mut positions = vec![Vec::new()];
    for extent in extents {
        positions = positions
            .into_iter()
            .flat_map(|prefix| {
                (0..*extent).map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_chunk_keys_and_padding() {
        let values = Array2::from_shape_fn((3, 5), |(r, c)| (r * 5 + c) as f64).into_dyn();
        let encoded = encode_array(&values, 2).unwrap();

        assert_eq!(encoded.metadata.chunks, vec![2, 2]);
        assert_eq!(encoded.metadata.chunk_grid(), vec![2, 3]);
        assert_eq!(encoded.metadata.chunk_keys(), vec!["0.0", "0.1", "0.2", "1.0", "1.1", "1.2"]);

        // Edge chunk (1, 2) holds one real value, the rest is NaN padding
        let (_, last) = encoded.chunks.last().unwrap();
        let raw = decompress(last).unwrap();
        assert_eq!(raw.len(), 4 * 8);
        assert_eq!(f64::read_le(&raw[..8]), 14.0);
        assert!(f64::read_le(&raw[8..16]).is_nan());
    }

    #[test]
    fn test_metadata_document() {
        let values = Array2::from_elem((2, 2), true).into_dyn();
        let encoded = encode_array(&values, 256).unwrap();
        let json = serde_json::to_value(&encoded.metadata).unwrap();

        assert_eq!(json["dtype"], "|b1");
        assert_eq!(json["chunks"], serde_json::json!([2, 2]));
        assert_eq!(json["compressor"]["id"], "zlib");
        assert_eq!(json["fill_value"], false);
        assert!(json["filters"].is_null());
        assert_eq!(json["zarr_format"], 2);
    }

    #[test]
    fn test_missing_chunk_reads_as_fill() {
        let values = Array2::from_elem((2, 4), 0.5).into_dyn();
        let encoded = encode_array(&values, 2).unwrap();
        let chunks: HashMap<_, _> = encoded.chunks.into_iter().filter(|(k, _)| k != "0.1").collect();

        let decoded: ArrayD<f64> = decode_array(&encoded.metadata, &chunks).unwrap();
        assert_eq!(decoded[[0, 0]], 0.5);
        assert!(decoded[[1, 3]].is_nan());
    }

    #[test]
    fn test_wrong_dtype_rejected() {
        let values = Array2::from_elem((2, 2), 1.0).into_dyn();
        let encoded = encode_array(&values, 2).unwrap();
        let chunks: HashMap<_, _> = encoded.chunks.into_iter().collect();
        assert!(decode_array::<bool>(&encoded.metadata, &chunks).is_err());
    }

    #[test]
    fn test_one_dimensional_array() {
        let values = ndarray::Array1::from(vec![1.0, 2.0, 3.0]).into_dyn();
        let encoded = encode_array(&values, 2).unwrap();
        assert_eq!(encoded.metadata.chunk_keys(), vec!["0", "1"]);
        let chunks: HashMap<_, _> = encoded.chunks.into_iter().collect();
        let decoded: ArrayD<f64> = decode_array(&encoded.metadata, &chunks).unwrap();
        assert_eq!(decoded, values);
    }
}
