//! Robust statistics over per-sample depths.

/// Median of `values`; `None` for an empty slice. NaNs sort last.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    })
}

/// Median absolute deviation around `center`.
pub fn mad(values: &[f64], center: f64) -> Option<f64> {
    let dev: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&dev)
}

/// Keep-mask for `values`: `false` marks an outlier.
///
/// A value is an outlier when it deviates from the median by more than
/// `multiplier * max(MAD, min_mad)`.
pub fn inlier_mask(values: &[f64], multiplier: f64, min_mad: f64) -> Vec<bool> {
    let Some(center) = median(values) else {
        return Vec::new();
    };
    let spread = mad(values, center).unwrap_or(0.0).max(min_mad);
    let limit = multiplier * spread;
    values
        .iter()
        .map(|v| (v - center).abs() <= limit)
        .collect()
}
