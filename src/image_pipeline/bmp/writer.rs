use std::io::Write;

use crate::image_pipeline::bmp::header::ContainerHeader;
use crate::image_pipeline::bmp::types::RasterImage;
use crate::image_pipeline::common::error::Result;

pub trait RasterWriter {
    /// Writes `image` using `source` as the template for the fields that are
    /// not derived from the image geometry.
    fn write_raster(&self, source: &ContainerHeader, image: &RasterImage, output: &mut dyn Write) -> Result<()>;
}
