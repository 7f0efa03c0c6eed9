//! Windowed GeoTIFF reads over HTTP range requests
//!
//! Only the header, the image directory and the tiles or strips that
//! overlap the requested window are downloaded. Decoding of each chunk
//! (compression, predictor, sample format) is left to the `tiff` crate,
//! which reads from a sparse in-memory copy of the remote file.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use futures::future::try_join_all;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::GridGeometry;
use impactarea_geo::models::PixelWindow;
use ndarray::Array2;
use tiff::decoder::{ChunkType, Decoder, DecodingResult};
use tiff::tags::Tag;

use super::client::{AssetBytes, StacClient};

const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;

/// First request; holds the header and directory of a cloud optimized GeoTIFF
const HEAD_BYTES: u64 = 64 * 1024;
/// Smallest follow-up request when the directory reaches past the head
const MIN_FETCH: u64 = 16 * 1024;
const MAX_METADATA_FETCHES: usize = 16;

/// North-up affine transform read from the GeoTIFF tags
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl PixelTransform {
    pub fn with_epsg(&self, epsg: u32) -> GridGeometry {
        GridGeometry {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            pixel_width: self.pixel_width,
            pixel_height: self.pixel_height,
            epsg,
        }
    }
}

fn decode_error(e: impl std::fmt::Display) -> ImpactError {
    ImpactError::unavailable(format!("GeoTIFF decode error: {}", e))
}

/// Byte ranges of a remote file fetched so far
#[derive(Debug, Default)]
pub struct SparseFile {
    len: Option<u64>,
    pos: u64,
    segments: BTreeMap<u64, Vec<u8>>,
    miss: Option<u64>,
}

impl SparseFile {
    /// A file held in full
    pub fn complete(bytes: Vec<u8>) -> Self {
        let mut file = Self::default();
        file.insert(AssetBytes { offset: 0, total: Some(bytes.len() as u64), bytes });
        file
    }

    pub fn insert(&mut self, part: AssetBytes) {
        if part.total.is_some() {
            self.len = part.total;
        }
        if !part.bytes.is_empty() {
            self.segments.insert(part.offset, part.bytes);
        }
    }

    /// Whether `offset..offset + len` is held
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        self.available(offset).is_some_and(|bytes| bytes.len() as u64 >= len)
    }

    /// Held bytes from `pos` to the end of its segment
    fn available(&self, pos: u64) -> Option<&[u8]> {
        self.segments.range(..=pos).rev().find_map(|(start, bytes)| {
            let skip = usize::try_from(pos - start).ok()?;
            (skip < bytes.len()).then(|| &bytes[skip..])
        })
    }

    /// Range to fetch after a read hit a hole
    fn take_miss(&mut self) -> Option<(u64, u64)> {
        let offset = self.miss.take()?;
        let end = self.len.map_or(offset + MIN_FETCH, |len| (offset + MIN_FETCH).min(len));
        (end > offset).then(|| (offset, end - offset))
    }
}

impl Read for SparseFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.len.is_some_and(|len| self.pos >= len) {
            return Ok(0);
        }
        let n = match self.available(self.pos) {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                n
            }
            None => {
                self.miss = Some(self.pos);
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "byte range not fetched"));
            }
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SparseFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len.and_then(|len| len.checked_add_signed(delta)),
        };
        self.pos = target.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid seek"))?;
        Ok(self.pos)
    }
}

/// Image structure and georeferencing of the first image of a GeoTIFF
#[derive(Debug, Clone, PartialEq)]
pub struct TiffLayout {
    pub width: usize,
    pub height: usize,
    /// Tile size, or image width by rows per strip
    pub chunk_width: usize,
    pub chunk_height: usize,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    pub transform: Option<PixelTransform>,
    pub epsg: Option<u32>,
}

impl TiffLayout {
    fn chunks_across(&self) -> usize {
        self.width.div_ceil(self.chunk_width)
    }

    /// Chunks overlapping `window`
    pub fn chunks_for(&self, window: &PixelWindow) -> Vec<usize> {
        if window.is_empty() {
            return Vec::new();
        }
        let across = self.chunks_across();
        let rows = window.row_offset / self.chunk_height
            ..=(window.row_offset + window.rows - 1) / self.chunk_height;
        let cols = window.col_offset / self.chunk_width
            ..=(window.col_offset + window.cols - 1) / self.chunk_width;
        rows.flat_map(|row| cols.clone().map(move |col| row * across + col))
            .filter(|index| *index < self.offsets.len())
            .collect()
    }

    /// File range of one chunk; `None` for chunks stored empty
    fn byte_range(&self, index: usize) -> Option<(u64, u64)> {
        let offset = *self.offsets.get(index)?;
        let len = *self.byte_counts.get(index)?;
        (len > 0).then_some((offset, len))
    }

    pub fn grid(&self, epsg: u32) -> Option<GridGeometry> {
        self.transform.map(|t| t.with_epsg(epsg))
    }
}

/// Parse the directory of the first image; reads may hit holes in `file`
pub fn read_layout(file: &mut SparseFile) -> Result<TiffLayout> {
    let mut decoder = Decoder::new(file).map_err(decode_error)?;
    let (width, height) = decoder.dimensions().map_err(decode_error)?;
    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    if chunk_width == 0 || chunk_height == 0 {
        return Err(decode_error("empty chunk dimensions"));
    }

    let (offsets_tag, counts_tag) = match decoder.get_chunk_type() {
        ChunkType::Tile => (Tag::TileOffsets, Tag::TileByteCounts),
        ChunkType::Strip => (Tag::StripOffsets, Tag::StripByteCounts),
    };
    let offsets = decoder.get_tag_u64_vec(offsets_tag).map_err(decode_error)?;
    let byte_counts = decoder.get_tag_u64_vec(counts_tag).map_err(decode_error)?;

    Ok(TiffLayout {
        width: width as usize,
        height: height as usize,
        chunk_width: chunk_width as usize,
        chunk_height: chunk_height as usize,
        offsets,
        byte_counts,
        transform: read_transform(&mut decoder),
        epsg: read_epsg(&mut decoder),
    })
}

/// Decode `window` from chunks already held in `file`; empty chunks stay NaN
pub fn decode_window(
    file: &mut SparseFile,
    layout: &TiffLayout,
    window: &PixelWindow,
) -> Result<Array2<f64>> {
    let mut decoder = Decoder::new(file).map_err(decode_error)?;
    let mut values = Array2::from_elem((window.rows, window.cols), f64::NAN);
    let across = layout.chunks_across();

    for index in layout.chunks_for(window) {
        if layout.byte_range(index).is_none() {
            continue;
        }
        let chunk_index = u32::try_from(index).map_err(decode_error)?;
        let (data_width, data_height) = decoder.chunk_data_dimensions(chunk_index);
        let (data_width, data_height) = (data_width as usize, data_height as usize);
        let samples = samples_to_f64(decoder.read_chunk(chunk_index).map_err(decode_error)?)?;
        // Multi-sample images are not supported
        if samples.len() != data_width * data_height {
            return Err(ImpactError::ShapeMismatch {
                expected: vec![data_height, data_width],
                actual: vec![samples.len()],
            });
        }

        let first_row = (index / across) * layout.chunk_height;
        let first_col = (index % across) * layout.chunk_width;
        for row in 0..data_height {
            let image_row = first_row + row;
            if image_row < window.row_offset || image_row >= window.row_offset + window.rows {
                continue;
            }
            for col in 0..data_width {
                let image_col = first_col + col;
                if image_col < window.col_offset || image_col >= window.col_offset + window.cols {
                    continue;
                }
                values[[image_row - window.row_offset, image_col - window.col_offset]] =
                    samples[row * data_width + col];
            }
        }
    }

    Ok(values)
}

fn samples_to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    Ok(match result {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => return Err(ImpactError::unavailable("Unsupported TIFF pixel format")),
    })
}

/// A GeoTIFF asset whose directory has been read
pub struct RemoteRaster {
    href: String,
    file: SparseFile,
    layout: TiffLayout,
}

impl RemoteRaster {
    /// Fetch the head of the asset and parse its directory
    pub async fn open(client: &StacClient, href: &str) -> Result<Self> {
        let mut file = SparseFile::default();
        file.insert(client.fetch_range(href, 0, HEAD_BYTES).await?);

        for _ in 0..MAX_METADATA_FETCHES {
            let layout = read_layout(&mut file);
            match file.take_miss() {
                Some((offset, len)) => file.insert(client.fetch_range(href, offset, len).await?),
                None => {
                    let layout = layout?;
                    tracing::debug!(
                        href,
                        width = layout.width,
                        height = layout.height,
                        chunk_width = layout.chunk_width,
                        chunk_height = layout.chunk_height,
                        "GeoTIFF directory read"
                    );
                    return Ok(Self { href: href.to_string(), file, layout });
                }
            }
        }
        Err(ImpactError::unavailable(format!("GeoTIFF directory of {} is too scattered", href)))
    }

    pub fn layout(&self) -> &TiffLayout {
        &self.layout
    }

    /// Download the chunks under `window` and decode it
    pub async fn read_window(&mut self, client: &StacClient, window: &PixelWindow) -> Result<Array2<f64>> {
        let missing: Vec<(u64, u64)> = self
            .layout
            .chunks_for(window)
            .into_iter()
            .filter_map(|index| self.layout.byte_range(index))
            .filter(|(offset, len)| !self.file.contains(*offset, *len))
            .collect();
        tracing::debug!(href = %self.href, chunks = missing.len(), "Fetching GeoTIFF chunks");

        let href = self.href.as_str();
        let parts = try_join_all(
            missing
                .iter()
                .map(|&(offset, len)| client.fetch_range(href, offset, len)),
        )
        .await?;
        for part in parts {
            self.file.insert(part);
        }

        decode_window(&mut self.file, &self.layout, window)
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<PixelTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    Some(PixelTransform {
        origin_x: tiepoint[3] - tiepoint[0] * scale[0],
        origin_y: tiepoint[4] + tiepoint[1] * scale[1],
        pixel_width: scale[0],
        pixel_height: -scale[1],
    })
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    epsg_from_geokeys(&keys)
}

/// Inline `ProjectedCSTypeGeoKey` or `GeographicTypeGeoKey` value
fn epsg_from_geokeys(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let entries: Vec<&[u16]> = keys.get(4..)?.chunks_exact(4).take(count).collect();
    let inline = |id: u16| {
        entries
            .iter()
            .find(|e| e[0] == id && e[1] == 0)
            .map(|e| u32::from(e[3]))
    };
    inline(PROJECTED_CS_TYPE_KEY).or_else(|| inline(GEOGRAPHIC_TYPE_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tiff::encoder::colortype::Gray32Float;
    use tiff::encoder::TiffEncoder;

    /// 4 rows by 3 columns, two rows per strip
    fn encode(values: &[f32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let mut image = encoder.new_image::<Gray32Float>(3, 4).unwrap();
            image.rows_per_strip(2).unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[10.0f64, 10.0, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 500_000.0, 4_800_000.0, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(
                    Tag::GeoKeyDirectoryTag,
                    &[1u16, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32631][..],
                )
                .unwrap();
            image.write_data(values).unwrap();
        }
        cursor.into_inner()
    }

    fn sample() -> Vec<u8> {
        encode(&(0..12).map(|v| v as f32).collect::<Vec<_>>())
    }

    #[test]
    fn test_layout_and_georeferencing() {
        let layout = read_layout(&mut SparseFile::complete(sample())).unwrap();

        assert_eq!((layout.width, layout.height), (3, 4));
        assert_eq!((layout.chunk_width, layout.chunk_height), (3, 2));
        assert_eq!(layout.epsg, Some(32631));

        let grid = layout.grid(32631).unwrap();
        assert_eq!(grid.origin_x, 500_000.0);
        assert_eq!(grid.origin_y, 4_800_000.0);
        assert_eq!(grid.pixel_height, -10.0);
    }

    #[test]
    fn test_window_uses_only_overlapping_strips() {
        let layout = read_layout(&mut SparseFile::complete(sample())).unwrap();
        let window = PixelWindow { row_offset: 2, col_offset: 1, rows: 2, cols: 2 };
        assert_eq!(layout.chunks_for(&window), vec![1]);

        // Only the header, directory and the second strip are held
        let bytes = sample();
        let mut file = SparseFile::default();
        let head = (layout.offsets[0].min(layout.offsets[1])) as usize;
        file.insert(AssetBytes { offset: 0, total: Some(bytes.len() as u64), bytes: bytes[..head].to_vec() });
        let (offset, len) = layout.byte_range(1).unwrap();
        file.insert(AssetBytes {
            offset,
            total: None,
            bytes: bytes[offset as usize..(offset + len) as usize].to_vec(),
        });
        let tail = (offset + len) as usize;
        file.insert(AssetBytes { offset: tail as u64, total: None, bytes: bytes[tail..].to_vec() });

        let values = decode_window(&mut file, &layout, &window).unwrap();
        assert_eq!(values, ndarray::array![[7.0, 8.0], [10.0, 11.0]]);
    }

    #[test]
    fn test_read_past_held_bytes_records_miss() {
        let bytes = sample();
        let mut file = SparseFile::default();
        file.insert(AssetBytes { offset: 0, total: Some(10 * MIN_FETCH), bytes: bytes[..8].to_vec() });

        assert!(read_layout(&mut file).is_err());
        let (offset, len) = file.take_miss().unwrap();
        assert!(offset >= 8);
        assert_eq!(len, MIN_FETCH);
        assert!(file.take_miss().is_none());
    }

    #[test]
    fn test_geokeys_without_crs() {
        assert_eq!(epsg_from_geokeys(&[1, 1, 0, 1, 1024, 0, 1, 1]), None);
        assert_eq!(epsg_from_geokeys(&[1, 1, 0, 1, 2048, 0, 1, 4326]), Some(4326));
        assert_eq!(epsg_from_geokeys(&[1, 1]), None);
    }

    #[test]
    fn test_garbage_is_unavailable() {
        let err = read_layout(&mut SparseFile::complete(b"not a tiff".to_vec())).unwrap_err();
        assert!(matches!(err, ImpactError::DataUnavailable { .. }));
    }
}
