//! Fixed-layout header records of the bitmap container.
//!
//! Both records are little-endian with no padding between fields. Offsets
//! below are relative to the start of each record:
//!
//! ```text
//! file header (14 bytes)          info header (40 bytes)
//!  0  magic        [u8; 2]         0  header_size          u32
//!  2  file_size    u32             4  width                i32
//!  6  reserved1    u16             8  height               i32
//!  8  reserved2    u16            12  planes               u16
//! 10  data_offset  u32            14  bit_count            u16
//!                                 16  compression          u32
//!                                 20  image_size           u32
//!                                 24  x_pixels_per_meter   i32
//!                                 28  y_pixels_per_meter   i32
//!                                 32  colors_used          u32
//!                                 36  colors_important     u32
//! ```

use crate::image_pipeline::bmp::types::{BitDepth, Palette, RasterImage};
use crate::image_pipeline::common::error::{PipelineError, Result};

pub const FILE_HEADER_SIZE: usize = 14;
pub const INFO_HEADER_SIZE: usize = 40;
pub const MAGIC: [u8; 2] = *b"BM";

/// 72 DPI, used when no source header supplies a resolution.
const DEFAULT_PIXELS_PER_METER: i32 = 2835;

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn put(buf: &mut [u8], at: usize, field: &[u8]) {
    buf[at..at + field.len()].copy_from_slice(field);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: [u8; 2],
    pub file_size: u32,
    pub reserved1: u16,
    pub reserved2: u16,
    pub data_offset: u32,
}

impl FileHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(PipelineError::Format(format!(
                "file header needs {} bytes, got {}",
                FILE_HEADER_SIZE,
                bytes.len()
            )));
        }
        let magic = [bytes[0], bytes[1]];
        if magic != MAGIC {
            return Err(PipelineError::Format(format!(
                "bad magic bytes {:02x} {:02x}",
                magic[0], magic[1]
            )));
        }
        Ok(Self {
            magic,
            file_size: read_u32(bytes, 2),
            reserved1: read_u16(bytes, 6),
            reserved2: read_u16(bytes, 8),
            data_offset: read_u32(bytes, 10),
        })
    }

    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        put(&mut buf, 0, &self.magic);
        put(&mut buf, 2, &self.file_size.to_le_bytes());
        put(&mut buf, 6, &self.reserved1.to_le_bytes());
        put(&mut buf, 8, &self.reserved2.to_le_bytes());
        put(&mut buf, 10, &self.data_offset.to_le_bytes());
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoHeader {
    pub header_size: u32,
    pub width: i32,
    /// Positive for bottom-up storage, negative for top-down.
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pixels_per_meter: i32,
    pub y_pixels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
}

impl InfoHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INFO_HEADER_SIZE {
            return Err(PipelineError::Format(format!(
                "info header needs {} bytes, got {}",
                INFO_HEADER_SIZE,
                bytes.len()
            )));
        }
        let header = Self {
            header_size: read_u32(bytes, 0),
            width: read_i32(bytes, 4),
            height: read_i32(bytes, 8),
            planes: read_u16(bytes, 12),
            bit_count: read_u16(bytes, 14),
            compression: read_u32(bytes, 16),
            image_size: read_u32(bytes, 20),
            x_pixels_per_meter: read_i32(bytes, 24),
            y_pixels_per_meter: read_i32(bytes, 28),
            colors_used: read_u32(bytes, 32),
            colors_important: read_u32(bytes, 36),
        };
        if (header.header_size as usize) < INFO_HEADER_SIZE {
            return Err(PipelineError::Format(format!(
                "info header declares {} bytes, at least {} required",
                header.header_size, INFO_HEADER_SIZE
            )));
        }
        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; INFO_HEADER_SIZE] {
        let mut buf = [0u8; INFO_HEADER_SIZE];
        put(&mut buf, 0, &self.header_size.to_le_bytes());
        put(&mut buf, 4, &self.width.to_le_bytes());
        put(&mut buf, 8, &self.height.to_le_bytes());
        put(&mut buf, 12, &self.planes.to_le_bytes());
        put(&mut buf, 14, &self.bit_count.to_le_bytes());
        put(&mut buf, 16, &self.compression.to_le_bytes());
        put(&mut buf, 20, &self.image_size.to_le_bytes());
        put(&mut buf, 24, &self.x_pixels_per_meter.to_le_bytes());
        put(&mut buf, 28, &self.y_pixels_per_meter.to_le_bytes());
        put(&mut buf, 32, &self.colors_used.to_le_bytes());
        put(&mut buf, 36, &self.colors_important.to_le_bytes());
        buf
    }

    pub fn is_bottom_up(&self) -> bool {
        self.height > 0
    }
}

/// File and info header of one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub file: FileHeader,
    pub info: InfoHeader,
}

impl ContainerHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let file = FileHeader::parse(bytes)?;
        let info = InfoHeader::parse(&bytes[FILE_HEADER_SIZE..])?;
        Ok(Self { file, info })
    }

    /// Header for an image that has no source container.
    pub fn for_image(image: &RasterImage) -> Result<Self> {
        let template = Self {
            file: FileHeader {
                magic: MAGIC,
                file_size: 0,
                reserved1: 0,
                reserved2: 0,
                data_offset: 0,
            },
            info: InfoHeader {
                header_size: INFO_HEADER_SIZE as u32,
                width: 0,
                height: 0,
                planes: 1,
                bit_count: 0,
                compression: 0,
                image_size: 0,
                x_pixels_per_meter: DEFAULT_PIXELS_PER_METER,
                y_pixels_per_meter: DEFAULT_PIXELS_PER_METER,
                colors_used: 0,
                colors_important: 0,
            },
        };
        template.derive_for(image)
    }

    /// Destination header for `image`. Resolution and reserved fields are
    /// carried over from `self`; every size, offset, count and layout field
    /// is recomputed from the image geometry. Rows are declared bottom-up.
    pub fn derive_for(&self, image: &RasterImage) -> Result<Self> {
        let too_large = || PipelineError::InvalidDimensions(image.width, image.height);

        let width = i32::try_from(image.width).map_err(|_| too_large())?;
        let height = i32::try_from(image.height).map_err(|_| too_large())?;
        let image_size = image
            .stride
            .checked_mul(image.height)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(too_large)?;

        let (palette_bytes, colors) = match image.depth {
            BitDepth::Indexed8 => ((Palette::SIZE * Palette::ENTRY_BYTES) as u32, Palette::SIZE as u32),
            BitDepth::Rgb24 => (0, 0),
        };
        let data_offset = (FILE_HEADER_SIZE + INFO_HEADER_SIZE) as u32 + palette_bytes;
        let file_size = data_offset.checked_add(image_size).ok_or_else(too_large)?;

        Ok(Self {
            file: FileHeader {
                magic: MAGIC,
                file_size,
                reserved1: self.file.reserved1,
                reserved2: self.file.reserved2,
                data_offset,
            },
            info: InfoHeader {
                header_size: INFO_HEADER_SIZE as u32,
                width,
                height,
                planes: 1,
                bit_count: image.depth.bits(),
                compression: 0,
                image_size,
                x_pixels_per_meter: self.info.x_pixels_per_meter,
                y_pixels_per_meter: self.info.y_pixels_per_meter,
                colors_used: colors,
                colors_important: colors,
            },
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FILE_HEADER_SIZE + INFO_HEADER_SIZE);
        bytes.extend_from_slice(&self.file.to_bytes());
        bytes.extend_from_slice(&self.info.to_bytes());
        bytes
    }
}
