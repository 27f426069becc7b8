use image::RgbImage;

use crate::image_pipeline::common::execution::{Execution, for_each_row};
use crate::image_pipeline::common::ProcessingContext;

/// Composites the warped first image and the second image placed at
/// `offset`.
///
/// A canvas pixel belongs to the first image when its warped value is not
/// black, and to the second when it falls inside the placed rectangle.
/// Where both apply the second image's weight ramps from 0 at its left edge
/// to 1 at its right edge.
pub fn blend(ctx: &ProcessingContext, warped: &RgbImage, second: &RgbImage, offset: (u32, u32)) -> RgbImage {
    let (width, height) = warped.dimensions();
    let (x_off, y_off) = (offset.0 as i64, offset.1 as i64);
    let (w2, h2) = (second.width() as i64, second.height() as i64);

    let mut canvas = RgbImage::new(width, height);
    let row_len = width as usize * 3;
    let buffer: &mut [u8] = &mut canvas;

    for_each_row(ctx, Execution::Parallel, buffer, row_len, |y, row| {
        let y = y as i64;
        for (x, out) in row.chunks_exact_mut(3).enumerate() {
            let x = x as i64;
            let first = warped.get_pixel(x as u32, y as u32).0;
            let in_first = first != [0, 0, 0];
            let in_second = x >= x_off && x < x_off + w2 && y >= y_off && y < y_off + h2;

            let value = match (in_first, in_second) {
                (true, true) => {
                    let other = second.get_pixel((x - x_off) as u32, (y - y_off) as u32).0;
                    let weight = ((x - x_off) as f32 / w2 as f32).clamp(0.0, 1.0);
                    [0, 1, 2].map(|c| (first[c] as f32 * (1.0 - weight) + other[c] as f32 * weight) as u8)
                }
                (true, false) => first,
                (false, true) => second.get_pixel((x - x_off) as u32, (y - y_off) as u32).0,
                (false, false) => continue,
            };
            out.copy_from_slice(&value);
        }
    });

    canvas
}
