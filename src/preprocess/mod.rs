//! Stake-region preprocessing: crop, luma/redness extraction, contrast
//! stretch and the vertical gradient plane.
//!
//! The contrast stretch maps the `low_percentile`..`high_percentile` luma
//! range of the crop onto `[0, 1]`. Percentiles come from a 256-bin
//! histogram so the transform is exact and deterministic. Crops whose
//! percentile range is narrower than `min_dynamic_range` grey levels are
//! left unstretched (scaled by 1/255) so noise is not amplified into
//! false edges.

pub mod filters;

use crate::edges::sobel_vertical;
use crate::error::MeasureError;
use crate::image::rgb::{luma, redness};
use crate::image::{gray_to_rgb, ImageF32, ImageRgb8, ImageU8, ImageView, ImageViewMut};
use crate::types::StakeRegion;
use log::debug;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    pub low_percentile: f32,
    pub high_percentile: f32,
    /// Minimum percentile spread (grey levels) before stretching.
    pub min_dynamic_range: f32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            low_percentile: 0.02,
            high_percentile: 0.98,
            min_dynamic_range: 8.0,
        }
    }
}

/// Cropped, normalized stake region. Immutable input to the detector.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRegion {
    /// Placement of the crop in the source image.
    pub region: StakeRegion,
    /// Contrast-stretched luma in `[0, 1]`.
    pub luma: ImageF32,
    /// Red dominance per pixel in `[0, 1]`; all zero for grey inputs.
    pub redness: ImageF32,
    /// Vertical Sobel response of `luma` (positive = brighter below).
    pub grad_y: ImageF32,
    /// Grey levels mapped to 0 and 1 by the stretch.
    pub stretch: (f32, f32),
}

impl NormalizedRegion {
    #[inline]
    pub fn width(&self) -> usize {
        self.luma.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.luma.h
    }

    /// Region-local row to absolute image row.
    #[inline]
    pub fn to_image_row(&self, local_row: f64) -> f64 {
        self.region.y as f64 + local_row
    }

    /// Absolute image row to region-local row (may fall outside the crop).
    #[inline]
    pub fn to_local_row(&self, image_row: f64) -> f64 {
        image_row - self.region.y as f64
    }

    /// Region-local column to absolute image column.
    #[inline]
    pub fn to_image_col(&self, local_col: usize) -> usize {
        self.region.x + local_col
    }

    /// Recompute the gradient plane after a caller mutated `luma`.
    pub fn refresh_gradient(&mut self) {
        self.grad_y = sobel_vertical(&self.luma);
    }
}

/// Crop `region` from `image` and normalize it for detection.
pub fn prepare(
    image: ImageRgb8<'_>,
    region: StakeRegion,
    opts: &PreprocessOptions,
) -> Result<NormalizedRegion, MeasureError> {
    if region.is_empty() {
        return Err(MeasureError::EmptyRegion(region));
    }
    if !image.contains_rect(region.x, region.y, region.width, region.height) {
        return Err(MeasureError::RegionOutOfBounds {
            region,
            width: image.w,
            height: image.h,
        });
    }

    let (w, h) = (region.width, region.height);
    let mut raw_luma = ImageF32::new(w, h);
    let mut red = ImageF32::new(w, h);
    let mut histogram = [0u32; 256];
    for y in 0..h {
        let src = &image.row(region.y + y)[region.x..region.x + w];
        let luma_row = raw_luma.row_mut(y);
        for (dst, &px) in luma_row.iter_mut().zip(src) {
            let l = luma(px);
            *dst = l;
            histogram[l.round().clamp(0.0, 255.0) as usize] += 1;
        }
        let red_row = red.row_mut(y);
        for (dst, &px) in red_row.iter_mut().zip(src) {
            *dst = redness(px);
        }
    }

    let total = (w * h) as u64;
    let lo = percentile_level(&histogram, total, opts.low_percentile);
    let hi = percentile_level(&histogram, total, opts.high_percentile);
    let stretch = if hi - lo >= opts.min_dynamic_range {
        (lo, hi)
    } else {
        (0.0, 255.0)
    };
    let scale = 1.0 / (stretch.1 - stretch.0);
    for v in raw_luma.data.iter_mut() {
        *v = ((*v - stretch.0) * scale).clamp(0.0, 1.0);
    }

    let grad_y = sobel_vertical(&raw_luma);
    debug!(
        "prepare: region={}x{}@({},{}) stretch=[{:.0}, {:.0}]",
        w, h, region.x, region.y, stretch.0, stretch.1
    );

    Ok(NormalizedRegion {
        region,
        luma: raw_luma,
        redness: red,
        grad_y,
        stretch,
    })
}

/// Convenience wrapper for single-channel sources.
pub fn prepare_gray(
    image: ImageU8<'_>,
    region: StakeRegion,
    opts: &PreprocessOptions,
) -> Result<NormalizedRegion, MeasureError> {
    let rgb = gray_to_rgb(image);
    prepare(ImageRgb8::packed(image.w, image.h, &rgb), region, opts)
}

/// Smallest grey level whose cumulative share reaches `q`.
fn percentile_level(histogram: &[u32; 256], total: u64, q: f32) -> f32 {
    let target = ((total as f64) * q.clamp(0.0, 1.0) as f64).ceil().max(1.0) as u64;
    let mut acc = 0u64;
    for (level, &count) in histogram.iter().enumerate() {
        acc += count as u64;
        if acc >= target {
            return level as f32;
        }
    }
    255.0
}
