//! End-to-end measurement of one image for one resort.
//!
//! [`SnowStakeMeasurer`] wires preprocessing, per-resort hooks and the
//! aggregator together. It holds only immutable options, so one instance
//! can serve many resorts and threads.
use crate::aggregate::{Aggregator, AggregatorOptions};
use crate::autocal::{OcrCalibratorOptions, TiltCalibratorOptions};
use crate::detector::{DetectorOptions, SnowLineDetector};
use crate::error::MeasureError;
use crate::image::{ImageRgb8, ImageU8};
use crate::preprocess::{prepare, prepare_gray, NormalizedRegion, PreprocessOptions};
use crate::store::ResortCalibration;
use crate::types::MeasurementResult;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// All engine tunables in one document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub preprocess: PreprocessOptions,
    pub detector: DetectorOptions,
    pub aggregator: AggregatorOptions,
    pub ocr: OcrCalibratorOptions,
    pub tilt: TiltCalibratorOptions,
}

pub type RegionHook = Arc<dyn Fn(&mut NormalizedRegion) + Send + Sync>;
pub type ResultHook = Arc<dyn Fn(&mut MeasurementResult) + Send + Sync>;

/// Optional per-resort adjustments around aggregation.
///
/// `pre` may rewrite the normalized region (masking a bracket, suppressing
/// glare); it must call [`NormalizedRegion::refresh_gradient`] after
/// editing luma. `post` may adjust the final result.
#[derive(Clone, Default)]
pub struct MeasurementHooks {
    pub pre: Option<RegionHook>,
    pub post: Option<ResultHook>,
}

impl MeasurementHooks {
    pub fn with_pre(mut self, hook: impl Fn(&mut NormalizedRegion) + Send + Sync + 'static) -> Self {
        self.pre = Some(Arc::new(hook));
        self
    }

    pub fn with_post(
        mut self,
        hook: impl Fn(&mut MeasurementResult) + Send + Sync + 'static,
    ) -> Self {
        self.post = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for MeasurementHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementHooks")
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SnowStakeMeasurer {
    preprocess: PreprocessOptions,
    aggregator: Aggregator,
    hooks: HashMap<String, MeasurementHooks>,
}

impl SnowStakeMeasurer {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            preprocess: options.preprocess.clone(),
            aggregator: Aggregator::new(
                SnowLineDetector::new(options.detector.clone()),
                options.aggregator.clone(),
            ),
            hooks: HashMap::new(),
        }
    }

    /// Registers hooks for `resort`, replacing earlier ones.
    pub fn with_hooks(mut self, resort: impl Into<String>, hooks: MeasurementHooks) -> Self {
        self.hooks.insert(resort.into(), hooks);
        self
    }

    /// Measures snow depth in `image` with the resort's calibration.
    ///
    /// `captured_at` (seconds since the Unix epoch) is copied into the
    /// result; the engine never reads the clock, so identical inputs give
    /// identical results.
    pub fn measure_image(
        &self,
        image: ImageRgb8<'_>,
        resort: &ResortCalibration,
        captured_at: Option<u64>,
    ) -> Result<MeasurementResult, MeasureError> {
        let t0 = Instant::now();
        let region = prepare(image, resort.stake_region, &self.preprocess)?;
        let result = self.measure_region(region, resort, captured_at)?;
        debug!(
            "SnowStakeMeasurer::measure_image resort={} depth={:?} confidence={:.2} in {:.2} ms",
            resort.resort,
            result.snow_depth_inches,
            result.confidence_score,
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    /// Grayscale variant of [`measure_image`](Self::measure_image).
    pub fn measure_gray(
        &self,
        image: ImageU8<'_>,
        resort: &ResortCalibration,
        captured_at: Option<u64>,
    ) -> Result<MeasurementResult, MeasureError> {
        let region = prepare_gray(image, resort.stake_region, &self.preprocess)?;
        self.measure_region(region, resort, captured_at)
    }

    fn measure_region(
        &self,
        mut region: NormalizedRegion,
        resort: &ResortCalibration,
        captured_at: Option<u64>,
    ) -> Result<MeasurementResult, MeasureError> {
        let hooks = self.hooks.get(&resort.resort);
        if let Some(pre) = hooks.and_then(|h| h.pre.as_ref()) {
            pre(&mut region);
        }
        let mut result =
            self.aggregator
                .measure(&region, &resort.calibration, resort.sample_count)?;
        result.timestamp = captured_at;
        if let Some(post) = hooks.and_then(|h| h.post.as_ref()) {
            post(&mut result);
        }
        Ok(result)
    }
}
