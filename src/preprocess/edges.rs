//! Gaussian smoothing followed by Canny edge detection.

use super::reflect101;
use crate::capture::{Frame, PixelFormat};

/// Binomial approximation used for a 5-tap kernel when sigma is left at 0.
const GAUSS_5: [u32; 5] = [1, 4, 6, 4, 1];

// tan(22.5°) and tan(67.5°) in 15-bit fixed point.
const TAN_22_5: i64 = 13573;
const TAN_67_5: i64 = 79109;

/// Value written for edge pixels.
pub(crate) const EDGE: u8 = 255;

/// Smooths a gray frame with a separable 5x5 Gaussian.
pub(crate) fn gaussian_blur(frame: &Frame) -> Frame {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let src = frame.pixels();

    let mut horizontal = vec![0u32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            horizontal[y * w + x] = GAUSS_5
                .iter()
                .enumerate()
                .map(|(k, &c)| c * u32::from(row[reflect101(x as isize + k as isize - 2, w)]))
                .sum();
        }
    }

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let sum: u32 = GAUSS_5
                .iter()
                .enumerate()
                .map(|(k, &c)| c * horizontal[reflect101(y as isize + k as isize - 2, h) * w + x])
                .sum();
            out.push(((sum + 128) >> 8) as u8);
        }
    }

    frame.derive(out, PixelFormat::Gray8)
}

/// Canny edge map: 255 on edges, 0 elsewhere.
///
/// Magnitudes above `high` seed edges, magnitudes at or below `low` are
/// never edges, and anything in between is kept only when 8-connected to an
/// edge.
pub(crate) fn canny(frame: &Frame, low: f32, high: f32) -> Frame {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let src = frame.pixels();

    let px = |x: isize, y: isize| -> i32 {
        i32::from(src[reflect101(y, h) * w + reflect101(x, w)])
    };

    let mut gx = vec![0i32; w * h];
    let mut gy = vec![0i32; w * h];
    let mut magnitude = vec![0i32; w * h];
    for y in 0..h as isize {
        for x in 0..w as isize {
            let dx = (px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x - 1, y) + px(x - 1, y + 1));
            let dy = (px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x, y - 1) + px(x + 1, y - 1));
            let i = y as usize * w + x as usize;
            gx[i] = dx;
            gy[i] = dy;
            magnitude[i] = dx.abs() + dy.abs();
        }
    }

    let mag_at = |x: isize, y: isize| -> i32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak candidate, 2 = strong
    let mut class = vec![0u8; w * h];
    let mut stack = Vec::new();
    for y in 0..h as isize {
        for x in 0..w as isize {
            let i = y as usize * w + x as usize;
            let m = magnitude[i];
            if m as f32 <= low {
                continue;
            }

            let (ax, ay) = (i64::from(gx[i].abs()), i64::from(gy[i].abs()));
            let ((x1, y1), (x2, y2)) = if (ay << 15) <= ax * TAN_22_5 {
                ((x - 1, y), (x + 1, y))
            } else if (ay << 15) >= ax * TAN_67_5 {
                ((x, y - 1), (x, y + 1))
            } else if (gx[i] < 0) == (gy[i] < 0) {
                ((x - 1, y - 1), (x + 1, y + 1))
            } else {
                ((x + 1, y - 1), (x - 1, y + 1))
            };

            if m > mag_at(x1, y1) && m >= mag_at(x2, y2) {
                if m as f32 > high {
                    class[i] = 2;
                    stack.push((x, y));
                } else {
                    class[i] = 1;
                }
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let n = ny as usize * w + nx as usize;
                if class[n] == 1 {
                    class[n] = 2;
                    stack.push((nx, ny));
                }
            }
        }
    }

    let edges = class
        .into_iter()
        .map(|c| if c == 2 { EDGE } else { 0 })
        .collect();
    frame.derive(edges, PixelFormat::Gray8)
}
