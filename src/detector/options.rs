use serde::Deserialize;

/// Knobs for the snow-line detector and its signals.
///
/// Luma-valued thresholds refer to the contrast-stretched `[0, 1]` plane.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// Profiles shorter than this are not analysed.
    pub min_profile_rows: usize,
    /// Gaussian 5-tap passes applied to luma and redness profiles.
    pub smoothing_passes: usize,
    pub gradient: GradientSignalOptions,
    pub brightness: BrightnessSignalOptions,
    pub color: ColorSignalOptions,
    /// Vote spread (pixels) tolerated before confidence is reduced.
    pub agreement_tolerance_px: f64,
    /// Mean signal strength that earns full contrast confidence.
    pub full_confidence_contrast: f64,
    /// Confidence factor when only one signal voted.
    pub single_signal_factor: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            min_profile_rows: 10,
            smoothing_passes: 2,
            gradient: GradientSignalOptions::default(),
            brightness: BrightnessSignalOptions::default(),
            color: ColorSignalOptions::default(),
            agreement_tolerance_px: 6.0,
            full_confidence_contrast: 0.5,
            single_signal_factor: 0.75,
        }
    }
}

/// Dark-above / bright-below edge in the vertical gradient profile.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GradientSignalOptions {
    pub enabled: bool,
    pub weight: f64,
    /// Minimum normalized gradient for an edge to count.
    pub min_edge_strength: f32,
    /// Edges weaker than this fraction of the strongest edge are ignored.
    pub relative_peak_fraction: f32,
}

impl Default for GradientSignalOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            min_edge_strength: 0.15,
            relative_peak_fraction: 0.5,
        }
    }
}

/// Midpoint threshold between snow brightness and exposed-stake brightness.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrightnessSignalOptions {
    pub enabled: bool,
    pub weight: f64,
    /// Rows above the scan start averaged as the snow level.
    pub bottom_window_rows: usize,
    /// Upper share of the profile averaged as the stake level.
    pub top_fraction: f32,
    /// Minimum snow-minus-stake contrast; below it the signal abstains.
    pub min_contrast: f32,
    /// Consecutive dark rows confirming the stake.
    pub dark_run: usize,
}

impl Default for BrightnessSignalOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            bottom_window_rows: 20,
            top_fraction: 0.3,
            // 35 grey levels on the unstretched scale
            min_contrast: 0.14,
            dark_run: 3,
        }
    }
}

/// Red-painted stake appearing above white snow.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ColorSignalOptions {
    pub enabled: bool,
    pub weight: f64,
    /// Redness above which a row counts as stake.
    pub min_redness: f32,
    /// Consecutive red rows confirming the stake.
    pub red_run: usize,
}

impl Default for ColorSignalOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            min_redness: 0.2,
            red_run: 3,
        }
    }
}
