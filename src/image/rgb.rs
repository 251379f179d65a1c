//! Borrowed RGB image view used as the engine's raw input.
//!
//! Pixels are stored as `[r, g, b]` triples; `stride` counts pixels, not
//! bytes. Grayscale sources can be lifted with [`gray_to_rgb`].
use super::ImageU8;

#[derive(Clone, Copy, Debug)]
pub struct ImageRgb8<'a> {
    pub w: usize,
    pub h: usize,
    /// Pixels between consecutive rows
    pub stride: usize,
    pub data: &'a [[u8; 3]],
}

impl<'a> ImageRgb8<'a> {
    pub fn packed(w: usize, h: usize, data: &'a [[u8; 3]]) -> Self {
        Self {
            w,
            h,
            stride: w,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        self.data[y * self.stride + x]
    }

    /// Borrowed view of the `w`x`h` window at `(x, y)`; `None` when the
    /// window does not fit.
    pub fn sub_view(&self, x: usize, y: usize, w: usize, h: usize) -> Option<ImageRgb8<'a>> {
        use crate::image::traits::ImageView;
        if w == 0 || h == 0 || !self.contains_rect(x, y, w, h) {
            return None;
        }
        let start = y * self.stride + x;
        let end = (y + h - 1) * self.stride + x + w;
        Some(ImageRgb8 {
            w,
            h,
            stride: self.stride,
            data: self.data.get(start..end)?,
        })
    }
}

impl<'a> crate::image::traits::ImageView for ImageRgb8<'a> {
    type Pixel = [u8; 3];

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn stride(&self) -> usize {
        self.stride
    }
    #[inline]
    fn row(&self, y: usize) -> &[[u8; 3]] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }
}

/// Replicate a grayscale view into an owned RGB pixel buffer.
pub fn gray_to_rgb(gray: ImageU8<'_>) -> Vec<[u8; 3]> {
    let mut out = Vec::with_capacity(gray.w * gray.h);
    for y in 0..gray.h {
        let start = y * gray.stride;
        out.extend(gray.data[start..start + gray.w].iter().map(|&v| [v, v, v]));
    }
    out
}

/// Rec. 601 luma in `[0, 255]`.
#[inline]
pub fn luma(px: [u8; 3]) -> f32 {
    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
}

/// How much red dominates the other two channels, in `[0, 1]`.
#[inline]
pub fn redness(px: [u8; 3]) -> f32 {
    let r = px[0] as f32;
    let other = px[1].max(px[2]) as f32;
    ((r - other) / 255.0).max(0.0)
}
