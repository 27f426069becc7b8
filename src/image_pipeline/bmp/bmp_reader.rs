//! Bitmap container decoder.
//!
//! Reads 24-bit and 8-bit uncompressed bitmaps into a [`RasterImage`] whose
//! rows are always ordered top to bottom, whatever the storage order of the
//! file. The sign of the stored height selects the storage order: positive
//! means the bottom row comes first, anything else means the top row does.

use std::path::Path;

use tracing::debug;

use crate::image_pipeline::bmp::header::{ContainerHeader, FILE_HEADER_SIZE};
use crate::image_pipeline::bmp::reader::RasterReader;
use crate::image_pipeline::bmp::types::{BitDepth, Palette, PaletteEntry, RasterImage, row_stride};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::files::read_input_file;

/// Decoder for the uncompressed bitmap container.
pub struct BmpReader;

impl RasterReader for BmpReader {
    /// Decodes a complete bitmap file held in memory.
    ///
    /// # Errors
    ///
    /// * `PipelineError::Format` when a header is truncated or inconsistent,
    ///   the width is not positive, the height is zero, the data is
    ///   compressed, the bit depth is neither 8 nor 24, or the pixel data is
    ///   shorter than the geometry requires.
    fn read_raster(&self, data: &[u8]) -> Result<(ContainerHeader, RasterImage)> {
        debug!("Decoding bitmap, {} bytes", data.len());

        let header = ContainerHeader::parse(data)?;
        let info = &header.info;

        if info.width <= 0 {
            return Err(PipelineError::Format(format!("width must be positive, got {}", info.width)));
        }
        if info.height == 0 {
            return Err(PipelineError::Format("height must not be zero".to_string()));
        }
        if info.compression != 0 {
            return Err(PipelineError::Format(format!(
                "compressed bitmaps are not supported (compression={})",
                info.compression
            )));
        }
        let depth = BitDepth::from_bits(info.bit_count).ok_or_else(|| {
            PipelineError::Format(format!("unsupported bit depth {}", info.bit_count))
        })?;

        let width = info.width as usize;
        let height = info.height.unsigned_abs() as usize;
        let stride = row_stride(width, depth);
        let bottom_up = info.is_bottom_up();

        debug!(
            "Header: {}x{} {}-bit, {}",
            width,
            height,
            depth.bits(),
            if bottom_up { "bottom-up" } else { "top-down" }
        );

        let palette_start = FILE_HEADER_SIZE + info.header_size as usize;
        let (palette, palette_end) = match depth {
            BitDepth::Indexed8 => {
                let (palette, end) = read_palette(data, palette_start, info.colors_used)?;
                (Some(palette), end)
            }
            BitDepth::Rgb24 => (None, palette_start),
        };

        // Offsets that point back into the headers are ignored.
        let offset = (header.file.data_offset as usize).max(palette_end);
        let needed = stride
            .checked_mul(height)
            .ok_or_else(|| PipelineError::Format(format!("image {}x{} is too large", width, height)))?;
        let pixels = offset
            .checked_add(needed)
            .and_then(|end| data.get(offset..end))
            .ok_or_else(|| {
                PipelineError::Format(format!(
                    "pixel data truncated: {} bytes needed at offset {}, file has {}",
                    needed,
                    offset,
                    data.len()
                ))
            })?;

        let mut image = RasterImage::new(width, height, depth);
        image.palette = palette;
        let packed = image.packed_row_len();

        for (stored, src_row) in pixels.chunks_exact(stride).enumerate() {
            let y = if bottom_up { height - 1 - stored } else { stored };
            image.row_mut(y)[..packed].copy_from_slice(&src_row[..packed]);
        }

        debug!("Bitmap decoded");
        Ok((header, image))
    }
}

fn read_palette(data: &[u8], start: usize, colors_used: u32) -> Result<(Palette, usize)> {
    let count = match colors_used as usize {
        0 => Palette::SIZE,
        n => n.min(Palette::SIZE),
    };
    let end = start + count * Palette::ENTRY_BYTES;
    let bytes = data.get(start..end).ok_or_else(|| {
        PipelineError::Format(format!("palette of {} entries is truncated", count))
    })?;
    let entries = bytes
        .chunks_exact(Palette::ENTRY_BYTES)
        .map(|quad| PaletteEntry {
            blue: quad[0],
            green: quad[1],
            red: quad[2],
            reserved: quad[3],
        })
        .collect();
    Ok((Palette::from_entries(entries), end))
}

/// Reads and decodes the bitmap at `path`.
pub fn decode<P: AsRef<Path>>(path: P) -> Result<(ContainerHeader, RasterImage)> {
    let bytes = read_input_file(path.as_ref())?;
    BmpReader.read_raster(&bytes)
}
