//! Affine parameters for a map sheet whose printed frame encloses the
//! reference extent.

use super::{Dimensions, GeometryError, PixelPoint};
use crate::catalog::Extent;
use crate::core::world_file::WorldFileParameters;

/// Map the pixel frame spanned by `points` onto `extent` grown by `margin`.
///
/// `margin` is a fraction of the extent's width (X) and height (Y) added on
/// every side. With fewer than two points the whole image is the frame.
/// The result is north-up: no rotation terms and a negative `E`.
pub fn frame_affine(
    dimensions: Dimensions,
    points: &[PixelPoint],
    extent: &Extent,
    margin: f64,
) -> Result<WorldFileParameters, GeometryError> {
    if !(extent.width() > 0.0 && extent.height() > 0.0) {
        return Err(GeometryError::InvalidExtent(format!(
            "extent {:?} has no area",
            extent
        )));
    }
    if !margin.is_finite() || margin <= -0.5 {
        return Err(GeometryError::InvalidExtent(format!(
            "margin {} collapses the extent",
            margin
        )));
    }

    let (x0, y0, x1, y1) = pixel_frame(dimensions, points)?;
    let target = extent.grown_by(margin);

    let a = target.width() / (x1 - x0);
    let e = -target.height() / (y1 - y0);

    Ok(WorldFileParameters {
        a,
        d: 0.0,
        b: 0.0,
        e,
        c: target.min_x + a * (0.5 - x0),
        f: target.max_y + e * (0.5 - y0),
    })
}

/// Bounding box `(x0, y0, x1, y1)` of the frame in continuous pixel space
fn pixel_frame(
    dimensions: Dimensions,
    points: &[PixelPoint],
) -> Result<(f64, f64, f64, f64), GeometryError> {
    let width = dimensions.width as f64;
    let height = dimensions.height as f64;

    if points.len() < 2 {
        if width == 0.0 || height == 0.0 {
            return Err(GeometryError::InvalidPoints("image has no pixels".to_string()));
        }
        return Ok((0.0, 0.0, width, height));
    }

    let mut x0 = f64::INFINITY;
    let mut y0 = f64::INFINITY;
    let mut x1 = f64::NEG_INFINITY;
    let mut y1 = f64::NEG_INFINITY;
    for &[x, y] in points {
        if !(0.0..=width).contains(&x) || !(0.0..=height).contains(&y) {
            return Err(GeometryError::InvalidPoints(format!(
                "point ({}, {}) lies outside the {}x{} image",
                x, y, dimensions.width, dimensions.height
            )));
        }
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }

    if x1 <= x0 || y1 <= y0 {
        return Err(GeometryError::InvalidPoints(
            "feature points do not span an area".to_string(),
        ));
    }
    Ok((x0, y0, x1, y1))
}
