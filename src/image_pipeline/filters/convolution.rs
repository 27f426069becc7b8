use tracing::debug;

use crate::image_pipeline::bmp::RasterImage;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::common::execution::{Execution, for_each_row};
use crate::image_pipeline::common::ProcessingContext;
use crate::image_pipeline::filters::kernel::{IntegerKernel, Kernel, SOBEL_X, SOBEL_Y};
use crate::image_pipeline::filters::point::gray_level;
use crate::image_pipeline::filters::require_rgb;

/// Convolves every pixel with `kernel`, replicating edge pixels for taps
/// that fall outside the image.
pub fn gaussian_blur(
    ctx: &ProcessingContext,
    execution: Execution,
    src: &RasterImage,
    kernel: &Kernel,
) -> Result<RasterImage> {
    require_rgb(src, "gaussian blur")?;
    debug!(size = kernel.size(), "gaussian blur ({})", execution.label());

    let mut dst = src.blank_like();
    let width = src.width as isize;
    let height = src.height as isize;
    let half = kernel.half() as isize;
    let stride = dst.stride;

    for_each_row(ctx, execution, &mut dst.data, stride, |y, row| {
        let y = y as isize;
        for x in 0..width {
            let mut sum = [0f32; 3];
            for ky in -half..=half {
                let src_row = src.row((y + ky).clamp(0, height - 1) as usize);
                for kx in -half..=half {
                    let sx = (x + kx).clamp(0, width - 1) as usize * 3;
                    let weight = kernel.weight(kx, ky);
                    for (acc, &value) in sum.iter_mut().zip(&src_row[sx..sx + 3]) {
                        *acc += value as f32 * weight;
                    }
                }
            }
            let offset = x as usize * 3;
            for (out, acc) in row[offset..offset + 3].iter_mut().zip(sum) {
                *out = ((acc + 0.5) as i32).clamp(0, 255) as u8;
            }
        }
    });
    Ok(dst)
}

/// Applies a 3×3 integer kernel to interior pixels. The one-pixel border
/// stays black.
pub fn convolve_3x3(
    ctx: &ProcessingContext,
    execution: Execution,
    src: &RasterImage,
    kernel: &IntegerKernel,
) -> Result<RasterImage> {
    require_rgb(src, "convolution")?;
    debug!(divisor = kernel.divisor, "3x3 convolution ({})", execution.label());

    let mut dst = src.blank_like();
    if src.width < 3 || src.height < 3 {
        return Ok(dst);
    }

    let width = src.width;
    let height = src.height;
    let divisor = f64::from(kernel.divisor);
    let stride = dst.stride;

    for_each_row(ctx, execution, &mut dst.data, stride, |y, row| {
        if y == 0 || y == height - 1 {
            return;
        }
        for x in 1..width - 1 {
            let mut sum = [0i64; 3];
            for (ky, taps) in kernel.taps.iter().enumerate() {
                let src_row = src.row(y + ky - 1);
                for (kx, &tap) in taps.iter().enumerate() {
                    let sx = (x + kx - 1) * 3;
                    for (acc, &value) in sum.iter_mut().zip(&src_row[sx..sx + 3]) {
                        *acc += value as i64 * tap as i64;
                    }
                }
            }
            for (out, acc) in row[x * 3..x * 3 + 3].iter_mut().zip(sum) {
                *out = (acc as f64 / divisor).round().clamp(0.0, 255.0) as u8;
            }
        }
    });
    Ok(dst)
}

/// Gradient magnitude of the per-pixel gray level, written to all three
/// channels. The one-pixel border stays black.
pub fn sobel(ctx: &ProcessingContext, execution: Execution, src: &RasterImage) -> Result<RasterImage> {
    require_rgb(src, "sobel")?;
    debug!("sobel ({})", execution.label());

    let mut dst = src.blank_like();
    if src.width < 3 || src.height < 3 {
        return Ok(dst);
    }

    let width = src.width;
    let height = src.height;
    let stride = dst.stride;

    for_each_row(ctx, execution, &mut dst.data, stride, |y, row| {
        if y == 0 || y == height - 1 {
            return;
        }
        for x in 1..width - 1 {
            let mut gx = 0i32;
            let mut gy = 0i32;
            for ky in 0..3 {
                for kx in 0..3 {
                    let gray = gray_level(src.bgr_at(x + kx - 1, y + ky - 1)) as i32;
                    gx += gray * SOBEL_X[ky][kx];
                    gy += gray * SOBEL_Y[ky][kx];
                }
            }
            let magnitude = (((gx * gx + gy * gy) as f64).sqrt() as i32).clamp(0, 255) as u8;
            row[x * 3..x * 3 + 3].fill(magnitude);
        }
    });
    Ok(dst)
}
