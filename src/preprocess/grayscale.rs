//! Luminance conversion with fixed BT.601 weights.

use crate::capture::{Frame, PixelFormat};

// 0.299 R + 0.587 G + 0.114 B in 14-bit fixed point.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;

/// Reduces a BGR frame to one intensity channel; gray input is copied.
pub(crate) fn to_gray(frame: &Frame) -> Frame {
    let pixels = match frame.format() {
        PixelFormat::Gray8 => frame.pixels().to_vec(),
        PixelFormat::Bgr8 => frame
            .pixels()
            .chunks_exact(3)
            .map(|px| {
                let (b, g, r) = (u32::from(px[0]), u32::from(px[1]), u32::from(px[2]));
                ((b * B_WEIGHT + g * G_WEIGHT + r * R_WEIGHT + (1 << 13)) >> 14) as u8
            })
            .collect(),
    };
    frame.derive(pixels, PixelFormat::Gray8)
}
