//! Weighted fusion of signal votes into a single candidate row.
use super::options::DetectorOptions;
use super::signals::SignalVote;
use crate::types::DetectionMethod;

/// Fused estimate in region-local rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FusedVote {
    pub row: f64,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub votes: usize,
}

/// Combines votes with weights `weight * strength`.
///
/// Confidence is the product of an agreement term (1 when every vote lies
/// within `agreement_tolerance_px` of the fused row) and a contrast term
/// saturating at `full_confidence_contrast`. A lone vote is discounted by
/// `single_signal_factor`.
pub fn fuse(votes: &[SignalVote], opts: &DetectorOptions) -> Option<FusedVote> {
    let usable: Vec<&SignalVote> = votes
        .iter()
        .filter(|v| v.weight > 0.0 && v.row.is_finite())
        .collect();
    if usable.is_empty() {
        return None;
    }

    let mut wsum = 0.0;
    let mut rsum = 0.0;
    for v in &usable {
        let w = v.weight * v.strength.max(0.0);
        wsum += w;
        rsum += w * v.row;
    }
    let row = if wsum > 0.0 {
        rsum / wsum
    } else {
        usable.iter().map(|v| v.row).sum::<f64>() / usable.len() as f64
    };

    let spread = usable
        .iter()
        .map(|v| (v.row - row).abs())
        .fold(0.0f64, f64::max);
    let tol = opts.agreement_tolerance_px.max(f64::EPSILON);
    let agreement = if spread <= tol { 1.0 } else { tol / spread };

    let mean_strength =
        usable.iter().map(|v| v.strength.max(0.0)).sum::<f64>() / usable.len() as f64;
    let contrast_term = if opts.full_confidence_contrast > 0.0 {
        (mean_strength / opts.full_confidence_contrast).min(1.0)
    } else {
        1.0
    };

    let mut confidence = agreement * contrast_term;
    let method = if usable.len() == 1 {
        confidence *= opts.single_signal_factor;
        usable[0].method
    } else {
        DetectionMethod::Fused
    };

    Some(FusedVote {
        row,
        confidence: confidence.clamp(0.0, 1.0),
        method,
        votes: usable.len(),
    })
}
