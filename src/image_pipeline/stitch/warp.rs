use image::RgbImage;
use nalgebra::{Matrix3, Vector3};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::execution::{Execution, for_each_row};
use crate::image_pipeline::common::ProcessingContext;

/// Channel value at `(x, y)`, black outside the image.
fn texel(src: &RgbImage, x: i64, y: i64, channel: usize) -> f64 {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        return 0.0;
    }
    src.get_pixel(x as u32, y as u32).0[channel] as f64
}

fn sample_bilinear(src: &RgbImage, x: f64, y: f64) -> [u8; 3] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut out = [0u8; 3];
    for (channel, value) in out.iter_mut().enumerate() {
        let top = texel(src, x0, y0, channel) * (1.0 - fx) + texel(src, x0 + 1, y0, channel) * fx;
        let bottom = texel(src, x0, y0 + 1, channel) * (1.0 - fx) + texel(src, x0 + 1, y0 + 1, channel) * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Renders `src` through `forward` onto a `width × height` canvas by
/// inverse mapping every destination pixel. Pixels that map outside `src`
/// stay black.
pub fn warp_perspective(
    ctx: &ProcessingContext,
    src: &RgbImage,
    forward: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let inverse = forward
        .try_inverse()
        .ok_or_else(|| PipelineError::NumericDegenerate("warp transform is not invertible".to_string()))?;

    let mut dst = RgbImage::new(width, height);
    let (src_w, src_h) = (src.width() as f64, src.height() as f64);
    let row_len = width as usize * 3;
    let buffer: &mut [u8] = &mut dst;

    for_each_row(ctx, Execution::Parallel, buffer, row_len, |y, row| {
        for (x, pixel) in row.chunks_exact_mut(3).enumerate() {
            let p = inverse * Vector3::new(x as f64, y as f64, 1.0);
            if p.z.abs() < 1e-12 {
                continue;
            }
            let (sx, sy) = (p.x / p.z, p.y / p.z);
            if !(sx > -1.0 && sy > -1.0 && sx < src_w && sy < src_h) {
                continue;
            }
            pixel.copy_from_slice(&sample_bilinear(src, sx, sy));
        }
    });

    Ok(dst)
}
