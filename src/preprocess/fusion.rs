//! Weighted blend of the equalized image and the closed edge map.

use crate::capture::{Frame, PixelFormat};

/// Weight of the contrast-enhanced frame.
pub const BASE_WEIGHT: f64 = 0.8;
/// Weight of the edge map.
pub const EDGE_WEIGHT: f64 = 0.2;

/// `round(0.8 * base + 0.2 * edges)` per pixel, saturated to 8 bits.
pub(crate) fn fuse(base: &Frame, edges: &Frame) -> Frame {
    let pixels = base
        .pixels()
        .iter()
        .zip(edges.pixels())
        .map(|(&a, &b)| {
            let v = BASE_WEIGHT * f64::from(a) + EDGE_WEIGHT * f64::from(b);
            v.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    base.derive(pixels, PixelFormat::Gray8)
}
