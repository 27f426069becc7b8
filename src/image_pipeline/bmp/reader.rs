use crate::image_pipeline::bmp::header::ContainerHeader;
use crate::image_pipeline::bmp::types::RasterImage;
use crate::image_pipeline::common::error::Result;

pub trait RasterReader {
    fn read_raster(&self, data: &[u8]) -> Result<(ContainerHeader, RasterImage)>;
}
