//! 3x3 morphological closing.

use crate::capture::{Frame, PixelFormat};

#[derive(Clone, Copy)]
enum Op {
    Dilate,
    Erode,
}

/// Dilation followed by erosion with a 3x3 square, one iteration.
///
/// Bridges one-pixel gaps in edge maps. Pixels outside the frame take no
/// part in either pass.
pub(crate) fn close(frame: &Frame) -> Frame {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let dilated = apply(frame.pixels(), w, h, Op::Dilate);
    let closed = apply(&dilated, w, h, Op::Erode);
    frame.derive(closed, PixelFormat::Gray8)
}

fn apply(src: &[u8], w: usize, h: usize, op: Op) -> Vec<u8> {
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let rows = y.saturating_sub(1)..(y + 2).min(h);
        for x in 0..w {
            let cols = x.saturating_sub(1)..(x + 2).min(w);
            let window = rows
                .clone()
                .flat_map(|ry| src[ry * w + cols.start..ry * w + cols.end].iter().copied());
            let value = match op {
                Op::Dilate => window.max(),
                Op::Erode => window.min(),
            };
            out.push(value.unwrap_or(0));
        }
    }
    out
}
