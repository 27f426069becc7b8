use nalgebra::{Matrix3, Point2};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::stitch::homography::project;

/// Output frame covering the warped first image and the second image.
///
/// `min_x`/`min_y` are the bounds in the second image's frame; both are at
/// most zero since the second image's rectangle is always included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub min_x: f64,
    pub min_y: f64,
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Bounds of the four corners of the `first` image after `h`, joined
    /// with the `second` image's rectangle.
    pub fn bounding(h: &Matrix3<f64>, first: (u32, u32), second: (u32, u32), max_dimension: usize) -> Result<Self> {
        let (w1, h1) = (first.0 as f64, first.1 as f64);
        let corners = [(0.0, 0.0), (0.0, h1), (w1, 0.0), (w1, h1)];

        let mut min_x = 0.0f64;
        let mut min_y = 0.0f64;
        let mut max_x = second.0 as f64;
        let mut max_y = second.1 as f64;
        for (x, y) in corners {
            let p = project(h, &Point2::new(x, y)).ok_or_else(|| {
                PipelineError::NumericDegenerate(format!("corner ({}, {}) projects to infinity", x, y))
            })?;
            if !(p.x.is_finite() && p.y.is_finite()) {
                return Err(PipelineError::NumericDegenerate(format!(
                    "corner ({}, {}) projects to a non-finite point",
                    x, y
                )));
            }
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let span_x = max_x - min_x;
        let span_y = max_y - min_y;
        if span_x > max_dimension as f64 || span_y > max_dimension as f64 {
            return Err(PipelineError::NumericDegenerate(format!(
                "canvas {:.0}x{:.0} exceeds {}",
                span_x, span_y, max_dimension
            )));
        }

        Ok(Self {
            min_x,
            min_y,
            width: (span_x as u32).max(1),
            height: (span_y as u32).max(1),
        })
    }

    /// Translation moving the canvas origin to (0, 0).
    pub fn translation(&self) -> Matrix3<f64> {
        Matrix3::new(1.0, 0.0, -self.min_x, 0.0, 1.0, -self.min_y, 0.0, 0.0, 1.0)
    }

    /// Top-left corner of the second image on the canvas.
    pub fn second_offset(&self) -> (u32, u32) {
        let x = ((-self.min_x) as u32).min(self.width - 1);
        let y = ((-self.min_y) as u32).min(self.height - 1);
        (x, y)
    }
}
