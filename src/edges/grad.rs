//! Sobel image gradients with border clamping.
//!
//! - Convolves the 3×3 Sobel pair with replicate borders.
//! - Outputs per-pixel `gx`, `gy` and `mag = sqrt(gx^2 + gy^2)`.
//!
//! Values are scaled by 1/4 so a unit step in a `[0, 1]` plane yields a
//! peak response of 1.0, which keeps detector thresholds in luma units.
//!
//! Complexity: O(W·H); memory: three float planes.
use crate::image::{ImageF32, ImageView, ImageViewMut};

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];
const SOBEL_NORM: f32 = 0.25;

/// Per-pixel gradient planes.
#[derive(Clone, Debug)]
pub struct Grad {
    /// Horizontal derivative (positive when brightness increases to the right)
    pub gx: ImageF32,
    /// Vertical derivative (positive when brightness increases downward)
    pub gy: ImageF32,
    /// Euclidean magnitude per pixel
    pub mag: ImageF32,
}

pub fn sobel_gradients(l: &ImageF32) -> Grad {
    let (w, h) = (l.w, l.h);
    let mut gx = ImageF32::new(w, h);
    let mut gy = ImageF32::new(w, h);
    let mut mag = ImageF32::new(w, h);
    if w == 0 || h == 0 {
        return Grad { gx, gy, mag };
    }

    for y in 0..h {
        let rows = [l.row(y.saturating_sub(1)), l.row(y), l.row((y + 1).min(h - 1))];
        let out_gx = gx.row_mut(y);
        for x in 0..w {
            out_gx[x] = convolve_at(&rows, x, w, &SOBEL_KERNEL_X);
        }
        let out_gy = gy.row_mut(y);
        for x in 0..w {
            out_gy[x] = convolve_at(&rows, x, w, &SOBEL_KERNEL_Y);
        }
    }
    for ((m, &dx), &dy) in mag.data.iter_mut().zip(&gx.data).zip(&gy.data) {
        *m = (dx * dx + dy * dy).sqrt();
    }

    Grad { gx, gy, mag }
}

/// Vertical derivative only; what the snow-line detector needs.
pub fn sobel_vertical(l: &ImageF32) -> ImageF32 {
    let (w, h) = (l.w, l.h);
    let mut gy = ImageF32::new(w, h);
    if w == 0 || h == 0 {
        return gy;
    }
    for y in 0..h {
        let rows = [l.row(y.saturating_sub(1)), l.row(y), l.row((y + 1).min(h - 1))];
        let out = gy.row_mut(y);
        for x in 0..w {
            out[x] = convolve_at(&rows, x, w, &SOBEL_KERNEL_Y);
        }
    }
    gy
}

#[inline]
fn convolve_at(rows: &[&[f32]; 3], x: usize, w: usize, kernel: &Kernel3) -> f32 {
    let xs = [x.saturating_sub(1), x, (x + 1).min(w - 1)];
    let mut sum = 0.0;
    for (row, k) in rows.iter().zip(kernel.iter()) {
        sum += row[xs[0]] * k[0] + row[xs[1]] * k[1] + row[xs[2]] * k[2];
    }
    sum * SOBEL_NORM
}
