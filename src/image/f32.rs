//! Owned single-channel f32 plane in row-major layout (stride == width).
//!
//! Used for every normalized channel the detector reads (luma, redness,
//! vertical gradient). Values are nominally in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    /// Width in pixels
    pub w: usize,
    /// Height in pixels
    pub h: usize,
    /// Number of f32 elements between consecutive rows (equals `w`)
    pub stride: usize,
    /// Backing storage in row-major order
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Zero-initialized plane of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            stride: w,
            data: vec![0.0; w * h],
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.stride + x
    }
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// Per-row mean over columns `[x0, x1)`, clamped to the plane width.
    ///
    /// Returns one value per row (a vertical profile). Empty when the
    /// clamped column range is empty.
    pub fn column_profile(&self, x0: usize, x1: usize) -> Vec<f32> {
        let x1 = x1.min(self.w);
        if x0 >= x1 {
            return Vec::new();
        }
        let n = (x1 - x0) as f32;
        (0..self.h)
            .map(|y| {
                let start = y * self.stride;
                self.data[start + x0..start + x1].iter().sum::<f32>() / n
            })
            .collect()
    }
}

impl crate::image::traits::ImageView for ImageF32 {
    type Pixel = f32;

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
    fn row(&self, y: usize) -> &[f32] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }
}

impl crate::image::traits::ImageViewMut for ImageF32 {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        let end = start + self.w;
        &mut self.data[start..end]
    }
}
