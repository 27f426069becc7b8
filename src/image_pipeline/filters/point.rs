use tracing::debug;

use crate::image_pipeline::bmp::{BitDepth, Palette, RasterImage};
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::common::execution::{Execution, for_each_row};
use crate::image_pipeline::common::ProcessingContext;
use crate::image_pipeline::filters::require_rgb;

/// Truncating channel average of a `[b, g, r]` pixel.
pub fn gray_level(bgr: [u8; 3]) -> u8 {
    ((bgr[0] as u32 + bgr[1] as u32 + bgr[2] as u32) / 3) as u8
}

/// `channel + delta`, saturated to the byte range.
pub fn shift_channel(channel: u8, delta: i32) -> u8 {
    (channel as i32).saturating_add(delta).clamp(0, 255) as u8
}

/// Averages the three channels into an 8-bit indexed image.
/// Indexed sources are read through their palette.
pub fn grayscale(ctx: &ProcessingContext, execution: Execution, src: &RasterImage) -> RasterImage {
    debug!("grayscale ({})", execution.label());
    map_to_indexed(ctx, execution, src, gray_level)
}

/// 255 where the gray level reaches `threshold`, 0 elsewhere.
pub fn binarize(ctx: &ProcessingContext, execution: Execution, src: &RasterImage, threshold: i32) -> RasterImage {
    debug!(threshold, "binarize ({})", execution.label());
    map_to_indexed(ctx, execution, src, |bgr| {
        if gray_level(bgr) as i32 >= threshold { 255 } else { 0 }
    })
}

/// Adds `delta` to every channel of a 24-bit image.
pub fn brightness(
    ctx: &ProcessingContext,
    execution: Execution,
    src: &RasterImage,
    delta: i32,
) -> Result<RasterImage> {
    require_rgb(src, "brightness")?;
    debug!(delta, "brightness ({})", execution.label());

    let mut dst = src.blank_like();
    let packed = src.packed_row_len();
    let stride = dst.stride;
    for_each_row(ctx, execution, &mut dst.data, stride, |y, row| {
        let src_row = src.row(y);
        for (out, &value) in row[..packed].iter_mut().zip(&src_row[..packed]) {
            *out = shift_channel(value, delta);
        }
    });
    Ok(dst)
}

fn map_to_indexed<F>(ctx: &ProcessingContext, execution: Execution, src: &RasterImage, level: F) -> RasterImage
where
    F: Fn([u8; 3]) -> u8 + Send + Sync,
{
    let mut dst = RasterImage::new(src.width, src.height, BitDepth::Indexed8);
    dst.palette = Some(Palette::grayscale(ctx, execution));
    let width = src.width;
    let stride = dst.stride;
    for_each_row(ctx, execution, &mut dst.data, stride, |y, row| {
        for (x, out) in row[..width].iter_mut().enumerate() {
            *out = level(src.bgr_at(x, y));
        }
    });
    dst
}
