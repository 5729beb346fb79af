//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The frame is split into a grid of tiles, each with its own clipped
//! histogram mapping. Clipping caps how steep a tile's mapping can get, which
//! keeps noise in flat regions from being stretched. Pixels are mapped by
//! bilinear interpolation between the four nearest tile centers so tile
//! borders do not show.

use crate::capture::{Frame, PixelFormat};

const BINS: usize = 256;

/// Per-axis interpolation: the two tile indices and the weight of the second.
#[derive(Clone, Copy)]
struct Blend {
    lo: usize,
    hi: usize,
    t: f32,
}

/// Equalizes a gray frame.
pub(crate) fn equalize(frame: &Frame, clip_limit: f32, grid: (u32, u32)) -> Frame {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let tiles_x = (grid.0 as usize).clamp(1, w);
    let tiles_y = (grid.1 as usize).clamp(1, h);

    let xs = bounds(w, tiles_x);
    let ys = bounds(h, tiles_y);
    let src = frame.pixels();

    let mut luts = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            luts.push(tile_lut(src, w, (xs[tx], xs[tx + 1]), (ys[ty], ys[ty + 1]), clip_limit));
        }
    }

    let x_centers = centers(&xs);
    let y_centers = centers(&ys);
    let x_blend: Vec<Blend> = (0..w).map(|x| blend(x, &x_centers)).collect();
    let y_blend: Vec<Blend> = (0..h).map(|y| blend(y, &y_centers)).collect();

    let mut out = Vec::with_capacity(w * h);
    for (y, yb) in y_blend.iter().enumerate() {
        let top = yb.lo * tiles_x;
        let bottom = yb.hi * tiles_x;
        for (x, xb) in x_blend.iter().enumerate() {
            let v = usize::from(src[y * w + x]);
            let upper = (1.0 - xb.t) * luts[top + xb.lo][v] + xb.t * luts[top + xb.hi][v];
            let lower = (1.0 - xb.t) * luts[bottom + xb.lo][v] + xb.t * luts[bottom + xb.hi][v];
            let value = (1.0 - yb.t) * upper + yb.t * lower;
            out.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }

    frame.derive(out, PixelFormat::Gray8)
}

/// Tile edges along one axis; every tile is non-empty when `tiles <= len`.
fn bounds(len: usize, tiles: usize) -> Vec<usize> {
    (0..=tiles).map(|i| i * len / tiles).collect()
}

/// Pixel coordinate of each tile's center.
fn centers(edges: &[usize]) -> Vec<f32> {
    edges
        .windows(2)
        .map(|e| (e[0] + e[1]) as f32 / 2.0 - 0.5)
        .collect()
}

fn blend(pos: usize, centers: &[f32]) -> Blend {
    let p = pos as f32;
    let last = centers.len() - 1;

    if p <= centers[0] {
        return Blend { lo: 0, hi: 0, t: 0.0 };
    }
    if p >= centers[last] {
        return Blend { lo: last, hi: last, t: 0.0 };
    }
    let lo = centers.iter().rposition(|&c| c <= p).unwrap_or(0);
    let hi = (lo + 1).min(last);
    let span = centers[hi] - centers[lo];
    let t = if span > 0.0 { (p - centers[lo]) / span } else { 0.0 };
    Blend { lo, hi, t }
}

/// Builds the clipped, equalized mapping for one tile.
fn tile_lut(
    src: &[u8],
    stride: usize,
    (x0, x1): (usize, usize),
    (y0, y1): (usize, usize),
    clip_limit: f32,
) -> [f32; BINS] {
    let mut hist = [0usize; BINS];
    for row in src[y0 * stride..y1 * stride].chunks_exact(stride) {
        for &v in &row[x0..x1] {
            hist[usize::from(v)] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    let clip = ((clip_limit * area as f32 / BINS as f32) as usize).max(1);
    let mut excess = 0;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    // Spread clipped counts evenly, then hand out the remainder
    let per_bin = excess / BINS;
    let residual = excess - per_bin * BINS;
    for count in hist.iter_mut() {
        *count += per_bin;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for i in (0..BINS).step_by(step).take(residual) {
            hist[i] += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0.0f32; BINS];
    let mut cumulative = 0usize;
    for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
        cumulative += count;
        *entry = (cumulative as f32 * scale).round().min(255.0);
    }
    lut
}
