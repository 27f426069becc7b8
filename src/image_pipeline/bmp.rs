//! Bitmap container codec
//!
//! Header records, the in-memory raster, and the reader/writer pair for
//! uncompressed 24-bit and 8-bit bitmaps.

mod bmp_reader;
mod bmp_writer;
pub mod header;
mod reader;
pub mod types;
mod writer;


pub use bmp_reader::{BmpReader, decode};
pub use bmp_writer::{BmpWriter, encode};
pub use header::{ContainerHeader, FileHeader, InfoHeader};
pub use reader::RasterReader;
pub use types::{BitDepth, Palette, PaletteEntry, RasterImage, row_stride};
pub use writer::RasterWriter;
