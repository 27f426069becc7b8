//! In-memory raster types

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::execution::{Execution, map_indices};
use crate::image_pipeline::common::ProcessingContext;

/// Pixel layouts the codec reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    /// One palette index per pixel
    Indexed8,
    /// Blue, green, red bytes per pixel
    Rgb24,
}

impl BitDepth {
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(BitDepth::Indexed8),
            24 => Some(BitDepth::Rgb24),
            _ => None,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Indexed8 => 8,
            BitDepth::Rgb24 => 24,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            BitDepth::Indexed8 => 1,
            BitDepth::Rgb24 => 3,
        }
    }
}

/// Bytes per stored row, rounded up to a multiple of four.
pub fn row_stride(width: usize, depth: BitDepth) -> usize {
    (width * depth.bytes_per_pixel()).div_ceil(4) * 4
}

/// One palette quad, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaletteEntry {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub reserved: u8,
}

/// A 256-entry colour table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    pub const SIZE: usize = 256;
    pub const ENTRY_BYTES: usize = 4;

    /// Identity ramp: entry `i` is `(i, i, i, 0)`. The entries are computed
    /// as independent tasks under `execution`.
    pub fn grayscale(ctx: &ProcessingContext, execution: Execution) -> Self {
        Self {
            entries: map_indices(ctx, execution, Self::SIZE, ramp_entry),
        }
    }

    /// Builds a palette from the entries found in a file. Missing entries
    /// are black, extra entries are dropped.
    pub fn from_entries(mut entries: Vec<PaletteEntry>) -> Self {
        entries.resize(Self::SIZE, PaletteEntry::default());
        Self { entries }
    }

    pub fn get(&self, index: u8) -> PaletteEntry {
        self.entries[index as usize]
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries
            .iter()
            .flat_map(|e| [e.blue, e.green, e.red, e.reserved])
            .collect()
    }
}

/// The identity ramp, built on the calling thread.
impl Default for Palette {
    fn default() -> Self {
        Self {
            entries: (0..Self::SIZE).map(ramp_entry).collect(),
        }
    }
}

fn ramp_entry(index: usize) -> PaletteEntry {
    let v = index as u8;
    PaletteEntry {
        blue: v,
        green: v,
        red: v,
        reserved: 0,
    }
}

/// Decoded image, rows top-to-bottom, each row `stride` bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: usize,
    pub height: usize,
    pub depth: BitDepth,
    pub stride: usize,
    /// Row-major pixel bytes, `stride * height` long
    pub data: Vec<u8>,
    /// Colour table of an indexed source image
    pub palette: Option<Palette>,
}

impl RasterImage {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize, depth: BitDepth) -> Self {
        let stride = row_stride(width, depth);
        Self {
            width,
            height,
            depth,
            stride,
            data: vec![0u8; stride * height],
            palette: None,
        }
    }

    /// Wraps an existing buffer that already uses the padded row layout.
    pub fn from_data(width: usize, height: usize, depth: BitDepth, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }
        let stride = row_stride(width, depth);
        if data.len() != stride * height {
            return Err(PipelineError::InvalidArgument(format!(
                "buffer holds {} bytes, a {}x{} {}-bit image needs {}",
                data.len(),
                width,
                height,
                depth.bits(),
                stride * height
            )));
        }
        Ok(Self {
            width,
            height,
            depth,
            stride,
            data,
            palette: None,
        })
    }

    /// Zero-filled image with the same geometry as `self`.
    pub fn blank_like(&self) -> Self {
        Self::new(self.width, self.height, self.depth)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.depth.bytes_per_pixel()
    }

    /// Bytes of a row that carry pixels, without padding.
    pub fn packed_row_len(&self) -> usize {
        self.width * self.bytes_per_pixel()
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub fn pixel_offset(&self, x: usize, y: usize) -> usize {
        y * self.stride + x * self.bytes_per_pixel()
    }

    /// Colour of a pixel as `[b, g, r]`, resolved through the palette for
    /// indexed images. Indexed images without a palette read as gray.
    pub fn bgr_at(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = self.pixel_offset(x, y);
        match self.depth {
            BitDepth::Rgb24 => [
                self.data[offset],
                self.data[offset + 1],
                self.data[offset + 2],
            ],
            BitDepth::Indexed8 => {
                let index = self.data[offset];
                match &self.palette {
                    Some(palette) => {
                        let e = palette.get(index);
                        [e.blue, e.green, e.red]
                    }
                    None => [index, index, index],
                }
            }
        }
    }
}
