use std::io::Write;
use std::iter::repeat_n;
use std::path::Path;

use tracing::debug;

use crate::image_pipeline::bmp::header::ContainerHeader;
use crate::image_pipeline::bmp::types::{BitDepth, RasterImage};
use crate::image_pipeline::bmp::writer::RasterWriter;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::common::files::write_output_file;

/// Encoder for the uncompressed bitmap container. Always emits bottom-up
/// rows with zeroed padding. 8-bit images carry the palette attached by the
/// filter that produced them, or the grayscale ramp when none is attached.
pub struct BmpWriter;

impl BmpWriter {
    pub fn encode_to_vec(&self, source: &ContainerHeader, image: &RasterImage) -> Result<Vec<u8>> {
        let header = source.derive_for(image)?;
        debug!(
            "Encoding bitmap: {}x{} {}-bit, {} bytes",
            image.width,
            image.height,
            image.depth.bits(),
            header.file.file_size
        );

        let mut buffer = Vec::with_capacity(header.file.file_size as usize);
        buffer.extend_from_slice(&header.to_bytes());
        if image.depth == BitDepth::Indexed8 {
            let palette = image.palette.clone().unwrap_or_default();
            buffer.extend_from_slice(&palette.to_bytes());
        }

        let packed = image.packed_row_len();
        let padding = image.stride - packed;
        for y in (0..image.height).rev() {
            buffer.extend_from_slice(&image.row(y)[..packed]);
            buffer.extend(repeat_n(0u8, padding));
        }
        Ok(buffer)
    }
}

impl RasterWriter for BmpWriter {
    fn write_raster(&self, source: &ContainerHeader, image: &RasterImage, output: &mut dyn Write) -> Result<()> {
        let buffer = self.encode_to_vec(source, image)?;
        output.write_all(&buffer)?;
        debug!("Bitmap encoding complete");
        Ok(())
    }
}

/// Encodes `image` and writes it to `path`.
pub fn encode<P: AsRef<Path>>(path: P, source: &ContainerHeader, image: &RasterImage) -> Result<()> {
    let buffer = BmpWriter.encode_to_vec(source, image)?;
    write_output_file(path.as_ref(), &buffer)
}
