//! Independent snow-line signals over one vertical profile.
//!
//! Every signal scans rows `0..start` of a region-local profile from the
//! bottom up and reports the fractional row where snow begins (the first
//! snow row below the exposed stake). Rows grow downward; snow is below
//! the stake, so a valid boundary never lies below `start`.
use super::options::{BrightnessSignalOptions, ColorSignalOptions, GradientSignalOptions};
use super::DetectionFailed;
use crate::types::DetectionMethod;

/// One signal's opinion about the boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalVote {
    pub method: DetectionMethod,
    /// Region-local fractional row where snow begins.
    pub row: f64,
    /// Contrast magnitude backing the vote, in luma units.
    pub strength: f64,
    pub weight: f64,
}

/// Lowest dark-to-bright edge (going down) that is a local maximum of the
/// vertical gradient and reaches both the absolute and relative thresholds.
///
/// The peak is refined with a parabola; Sobel responses straddle the
/// boundary, so the snow row sits half a pixel below the refined peak.
pub fn gradient_signal(
    grad: &[f32],
    start: usize,
    opts: &GradientSignalOptions,
) -> Option<SignalVote> {
    let n = grad.len();
    if n < 3 || start < 2 {
        return None;
    }
    let last = (start - 1).min(n - 2);
    let strongest = grad[1..=last].iter().copied().fold(0.0f32, f32::max);
    let floor = opts
        .min_edge_strength
        .max(strongest * opts.relative_peak_fraction);
    if strongest < opts.min_edge_strength {
        return None;
    }

    for i in (1..=last).rev() {
        let c = grad[i];
        if c < floor || c < grad[i - 1] || c <= grad[i + 1] {
            continue;
        }
        let peak = i as f64 + parabolic_offset(grad[i - 1], c, grad[i + 1]);
        return Some(SignalVote {
            method: DetectionMethod::Gradient,
            row: (peak + 0.5).min(start as f64),
            strength: c as f64,
            weight: opts.weight,
        });
    }
    None
}

/// Midpoint threshold between the snow level just above `start` and the
/// stake level at the top of the profile.
///
/// Fails with `LowContrast` / `InvertedBrightness` when the snow is not
/// clearly brighter than the stake (flat light, night IR imagery).
pub fn brightness_signal(
    luma: &[f32],
    start: usize,
    opts: &BrightnessSignalOptions,
) -> Result<SignalVote, DetectionFailed> {
    let n = luma.len();
    let start = start.min(n);
    if start == 0 {
        return Err(DetectionFailed::NoTransition);
    }
    let bottom_lo = start.saturating_sub(opts.bottom_window_rows.max(1));
    let bottom = mean(&luma[bottom_lo..start]);
    let top_rows = ((n as f32 * opts.top_fraction).ceil() as usize).clamp(1, n);
    let top = mean(&luma[..top_rows]);

    let contrast = bottom - top;
    if contrast < opts.min_contrast {
        let contrast = contrast as f64;
        return Err(if contrast >= 0.0 {
            DetectionFailed::LowContrast { contrast }
        } else {
            DetectionFailed::InvertedBrightness { contrast }
        });
    }

    let threshold = 0.5 * (bottom + top);
    let run = opts.dark_run.max(1);
    let row = first_run_from_bottom(luma, start, run, |v| v < threshold)
        .ok_or(DetectionFailed::NoTransition)?;
    Ok(SignalVote {
        method: DetectionMethod::Brightness,
        row: row as f64,
        strength: contrast as f64,
        weight: opts.weight,
    })
}

/// Red stake paint above white snow. Abstains on colourless profiles.
pub fn color_signal(
    redness: &[f32],
    start: usize,
    opts: &ColorSignalOptions,
) -> Option<SignalVote> {
    let start = start.min(redness.len());
    if start == 0 {
        return None;
    }
    let scanned = &redness[..start];
    let peak = scanned.iter().copied().fold(0.0f32, f32::max);
    if peak < opts.min_redness {
        return None;
    }
    let run = opts.red_run.max(1);
    let row = first_run_from_bottom(redness, start, run, |v| v > opts.min_redness)?;
    let stake_level = mean(&redness[row.saturating_sub(run)..row]);
    let snow_level = if row < start {
        mean(&redness[row..start])
    } else {
        0.0
    };
    Some(SignalVote {
        method: DetectionMethod::StakeColor,
        row: row as f64,
        strength: (stake_level - snow_level).max(0.0) as f64,
        weight: opts.weight,
    })
}

/// Scans `profile[..start]` upward; returns the row just below the first
/// run of `run` consecutive rows satisfying `is_stake`.
fn first_run_from_bottom(
    profile: &[f32],
    start: usize,
    run: usize,
    is_stake: impl Fn(f32) -> bool,
) -> Option<usize> {
    let mut consecutive = 0usize;
    for i in (0..start.min(profile.len())).rev() {
        if is_stake(profile[i]) {
            consecutive += 1;
            if consecutive >= run {
                return Some(i + run);
            }
        } else {
            consecutive = 0;
        }
    }
    None
}

#[inline]
fn parabolic_offset(l: f32, c: f32, r: f32) -> f64 {
    let denom = l - 2.0 * c + r;
    if denom.abs() <= f32::EPSILON {
        return 0.0;
    }
    (0.5 * (l - r) / denom).clamp(-0.5, 0.5) as f64
}

#[inline]
fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: usize, edge: usize, above: f32, below: f32) -> Vec<f32> {
        (0..n).map(|i| if i < edge { above } else { below }).collect()
    }

    #[test]
    fn gradient_locates_sharp_step() {
        // Sobel response of a unit step at row 30: rows 29 and 30 respond.
        let mut g = vec![0.0f32; 60];
        g[29] = 1.0;
        g[30] = 1.0;
        let vote = gradient_signal(&g, 55, &GradientSignalOptions::default()).expect("edge");
        assert!((vote.row - 30.0).abs() < 1e-9);
        assert_eq!(vote.method, DetectionMethod::Gradient);
        assert_eq!(vote.strength, 1.0);
    }

    #[test]
    fn gradient_prefers_lowest_strong_edge() {
        let mut g = vec![0.0f32; 80];
        g[10] = 0.9; // marker paint high on the stake
        g[50] = 0.6; // snow line
        g[70] = 0.2; // clump in the snow, below the relative floor
        let vote = gradient_signal(&g, 78, &GradientSignalOptions::default()).expect("edge");
        assert!((vote.row - 50.5).abs() < 1e-9);
    }

    #[test]
    fn gradient_ignores_edges_below_start_and_weak_profiles() {
        let mut g = vec![0.0f32; 40];
        g[35] = 1.0;
        assert!(gradient_signal(&g, 20, &GradientSignalOptions::default()).is_none());
        let weak = vec![0.05f32; 40];
        assert!(gradient_signal(&weak, 39, &GradientSignalOptions::default()).is_none());
    }

    #[test]
    fn brightness_finds_first_dark_run() {
        let luma = step(100, 40, 0.1, 0.9);
        let vote = brightness_signal(&luma, 90, &BrightnessSignalOptions::default())
            .expect("high contrast");
        assert_eq!(vote.row, 40.0);
        assert!((vote.strength - 0.8).abs() < 1e-6);
    }

    #[test]
    fn brightness_reports_inverted_and_flat_profiles() {
        let night = step(100, 40, 0.8, 0.2);
        match brightness_signal(&night, 90, &BrightnessSignalOptions::default()) {
            Err(DetectionFailed::InvertedBrightness { contrast }) => assert!(contrast < 0.0),
            other => panic!("expected inverted brightness, got {other:?}"),
        }
        let flat = step(100, 40, 0.50, 0.55);
        assert!(matches!(
            brightness_signal(&flat, 90, &BrightnessSignalOptions::default()),
            Err(DetectionFailed::LowContrast { .. })
        ));
    }

    #[test]
    fn brightness_with_snow_over_whole_line_finds_nothing() {
        // Bright everywhere except a dark band at the very top that is too
        // thin to count as exposed stake.
        let mut luma = vec![0.9f32; 100];
        luma[0] = 0.0;
        luma[1] = 0.0;
        let opts = BrightnessSignalOptions {
            top_fraction: 0.02,
            ..Default::default()
        };
        assert_eq!(
            brightness_signal(&luma, 100, &opts),
            Err(DetectionFailed::NoTransition)
        );
    }

    #[test]
    fn color_abstains_without_red() {
        let grey = vec![0.0f32; 50];
        assert!(color_signal(&grey, 50, &ColorSignalOptions::default()).is_none());
    }

    #[test]
    fn color_finds_red_stake_bottom() {
        let red = step(60, 25, 0.7, 0.0);
        let vote = color_signal(&red, 55, &ColorSignalOptions::default()).expect("red stake");
        assert_eq!(vote.row, 25.0);
        assert!((vote.strength - 0.7).abs() < 1e-6);
    }
}
