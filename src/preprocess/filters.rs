//! 1D smoothing kernels applied to vertical sample profiles.

/// Symmetric 1D filter taps in left-to-right order.
pub trait SeparableFilter {
    fn taps(&self) -> &[f32];
}

/// Wrapper around a static kernel.
#[derive(Clone, Copy, Debug)]
pub struct StaticSeparableFilter {
    taps: &'static [f32],
}

impl StaticSeparableFilter {
    pub const fn new(taps: &'static [f32]) -> Self {
        Self { taps }
    }
}

impl SeparableFilter for StaticSeparableFilter {
    #[inline]
    fn taps(&self) -> &[f32] {
        self.taps
    }
}

/// Normalised 5-tap Gaussian `[1, 4, 6, 4, 1] / 16` (sigma ≈ 1).
pub const GAUSSIAN_5TAP: StaticSeparableFilter =
    StaticSeparableFilter::new(&[0.0625, 0.25, 0.375, 0.25, 0.0625]);

/// Convolve a profile with `filter`, clamping indices at both ends.
///
/// Repeated passes approximate a wider Gaussian (variance adds up).
pub fn smooth_profile(profile: &[f32], filter: &dyn SeparableFilter, passes: usize) -> Vec<f32> {
    let taps = filter.taps();
    let n = profile.len();
    if n == 0 || taps.is_empty() {
        return profile.to_vec();
    }
    let radius = taps.len() / 2;
    let mut src = profile.to_vec();
    let mut dst = vec![0.0f32; n];
    for _ in 0..passes {
        for (i, out) in dst.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &t) in taps.iter().enumerate() {
                let j = (i + k).saturating_sub(radius).min(n - 1);
                acc += src[j] * t;
            }
            *out = acc;
        }
        std::mem::swap(&mut src, &mut dst);
    }
    src
}
