use serde::Deserialize;

/// Sample placement, outlier rejection and confidence knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AggregatorOptions {
    /// Share of the region width covered by sample columns.
    pub span_fraction: f64,
    /// Columns averaged on each side of a sample column.
    pub column_half_width: usize,
    /// Sample count used when the caller passes 0.
    pub default_sample_count: usize,
    /// Samples further than `mad_multiplier * MAD` from the median are dropped.
    pub mad_multiplier: f64,
    /// Floor on the MAD in inches; applies when most readings coincide.
    pub min_mad_inches: f64,
    /// Confidence factor for samples converted outside the marker span.
    pub extrapolation_discount: f64,
    /// Results below this confidence are logged as low quality.
    pub high_confidence: f64,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            span_fraction: 0.75,
            column_half_width: 2,
            default_sample_count: 10,
            mad_multiplier: 3.0,
            min_mad_inches: 0.5,
            extrapolation_discount: 0.75,
            high_confidence: 0.8,
        }
    }
}
