//! Color-preserving non-local-means denoising.
//!
//! The frame is split into BT.601 luma and chroma planes so brightness
//! noise and color noise can be filtered with separate strengths, then
//! recombined. Each output pixel is a weighted mean over a search window,
//! weighted by how similar the 3x3 patch around each candidate is to the
//! patch around the pixel being filtered.

use super::reflect101;
use crate::capture::{Frame, PixelFormat};

/// Patch radius (3x3 template).
const TEMPLATE_RADIUS: usize = 1;
/// Search radius (7x7 window).
const SEARCH_RADIUS: usize = 3;
const TEMPLATE_AREA: u32 = ((2 * TEMPLATE_RADIUS + 1) * (2 * TEMPLATE_RADIUS + 1)) as u32;
const PAD: usize = TEMPLATE_RADIUS + SEARCH_RADIUS;

// BT.601 fixed point, 14 fractional bits.
const SHIFT: i32 = 14;
const ROUND: i32 = 1 << (SHIFT - 1);
const Y_R: i32 = 4899;
const Y_G: i32 = 9617;
const Y_B: i32 = 1868;
const CR_SCALE: i32 = 11682;
const CB_SCALE: i32 = 9241;
const R_CR: i32 = 22987;
const G_CR: i32 = 11698;
const G_CB: i32 = 5636;
const B_CB: i32 = 29049;

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Denoises a frame. Gray input only has a luma plane.
pub(crate) fn denoise(frame: &Frame, luma_strength: f32, chroma_strength: f32) -> Frame {
    let (w, h) = (frame.width() as usize, frame.height() as usize);

    match frame.format() {
        PixelFormat::Gray8 => {
            frame.derive(nl_means(frame.pixels(), w, h, luma_strength), PixelFormat::Gray8)
        }
        PixelFormat::Bgr8 => {
            if luma_strength == 0.0 && chroma_strength == 0.0 {
                return frame.derive(frame.pixels().to_vec(), PixelFormat::Bgr8);
            }
            let (y, cb, cr) = split_ycbcr(frame.pixels());
            let y = nl_means(&y, w, h, luma_strength);
            let cb = nl_means(&cb, w, h, chroma_strength);
            let cr = nl_means(&cr, w, h, chroma_strength);
            frame.derive(merge_bgr(&y, &cb, &cr), PixelFormat::Bgr8)
        }
    }
}

fn split_ycbcr(bgr: &[u8]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let n = bgr.len() / 3;
    let mut y_plane = Vec::with_capacity(n);
    let mut cb_plane = Vec::with_capacity(n);
    let mut cr_plane = Vec::with_capacity(n);

    for px in bgr.chunks_exact(3) {
        let (b, g, r) = (i32::from(px[0]), i32::from(px[1]), i32::from(px[2]));
        let y = (b * Y_B + g * Y_G + r * Y_R + ROUND) >> SHIFT;
        let cr = ((r - y) * CR_SCALE + ROUND) >> SHIFT;
        let cb = ((b - y) * CB_SCALE + ROUND) >> SHIFT;
        y_plane.push(clamp_u8(y));
        cr_plane.push(clamp_u8(cr + 128));
        cb_plane.push(clamp_u8(cb + 128));
    }

    (y_plane, cb_plane, cr_plane)
}

fn merge_bgr(y: &[u8], cb: &[u8], cr: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(y.len() * 3);
    for ((&y, &cb), &cr) in y.iter().zip(cb).zip(cr) {
        let y = i32::from(y);
        let cb = i32::from(cb) - 128;
        let cr = i32::from(cr) - 128;
        let b = y + ((cb * B_CB + ROUND) >> SHIFT);
        let g = y - ((cr * G_CR + cb * G_CB + ROUND) >> SHIFT);
        let r = y + ((cr * R_CR + ROUND) >> SHIFT);
        out.extend_from_slice(&[clamp_u8(b), clamp_u8(g), clamp_u8(r)]);
    }
    out
}

/// Filters a single 8-bit plane. Strength 0 returns the plane unchanged.
fn nl_means(plane: &[u8], w: usize, h: usize, strength: f32) -> Vec<u8> {
    if strength <= 0.0 || w == 0 || h == 0 {
        return plane.to_vec();
    }

    // Weight by mean squared patch distance
    let h2 = f64::from(strength) * f64::from(strength);
    let weights: Vec<f64> = (0..=255u32 * 255)
        .map(|d| (-(f64::from(d)) / h2).exp())
        .collect();

    let pw = w + 2 * PAD;
    let padded = pad_reflect(plane, w, h, PAD);
    let t = TEMPLATE_RADIUS as isize;
    let s = SEARCH_RADIUS as isize;
    let stride = pw as isize;

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let center = ((y + PAD) * pw + x + PAD) as isize;
            let mut acc = 0.0f64;
            let mut total = 0.0f64;

            for dy in -s..=s {
                for dx in -s..=s {
                    let candidate = center + dy * stride + dx;
                    let mut distance = 0u32;
                    for ty in -t..=t {
                        for tx in -t..=t {
                            let off = ty * stride + tx;
                            let a = i32::from(padded[(center + off) as usize]);
                            let b = i32::from(padded[(candidate + off) as usize]);
                            distance += ((a - b) * (a - b)) as u32;
                        }
                    }
                    let weight = weights[(distance / TEMPLATE_AREA) as usize];
                    acc += weight * f64::from(padded[candidate as usize]);
                    total += weight;
                }
            }

            out.push(clamp_u8((acc / total).round() as i32));
        }
    }
    out
}

fn pad_reflect(plane: &[u8], w: usize, h: usize, pad: usize) -> Vec<u8> {
    let pw = w + 2 * pad;
    let ph = h + 2 * pad;
    let mut out = Vec::with_capacity(pw * ph);
    for py in 0..ph {
        let sy = reflect101(py as isize - pad as isize, h);
        for px in 0..pw {
            let sx = reflect101(px as isize - pad as isize, w);
            out.push(plane[sy * w + sx]);
        }
    }
    out
}
