//! Geometric correction for a stake leaning in the image plane.
//!
//! Angles are in degrees, positive when the top of the stake leans towards
//! +x (clockwise on screen, y pointing down). The observed stake is the
//! upright stake rotated by `tilt_angle` about the pivot
//! (`stake_centerline_x`, zero-inch row); correction applies the inverse
//! rotation and hands the upright row to the base model.
use nalgebra::{Point2, Rotation2};

/// Pivot-relative rotation undoing a known tilt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TiltCorrection {
    pub tilt_degrees: f64,
    pub pivot: Point2<f64>,
}

impl TiltCorrection {
    pub fn new(tilt_degrees: f64, pivot_x: f64, pivot_row: f64) -> Self {
        Self {
            tilt_degrees,
            pivot: Point2::new(pivot_x, pivot_row),
        }
    }

    /// Upright row for a point observed at `(x, row)`.
    pub fn corrected_row_at(&self, x: f64, row: f64) -> f64 {
        if self.tilt_degrees == 0.0 {
            return row;
        }
        let undo = Rotation2::new(-self.tilt_degrees.to_radians());
        let upright = self.pivot + undo * (Point2::new(x, row) - self.pivot);
        upright.y
    }

    /// Upright row for a point assumed to lie on the stake axis, when
    /// only its row is known: the vertical offset from the pivot is the
    /// projection of the along-stake distance.
    pub fn corrected_row(&self, row: f64) -> f64 {
        if self.tilt_degrees == 0.0 {
            return row;
        }
        let cos = self.tilt_degrees.to_radians().cos();
        self.pivot.y + (row - self.pivot.y) / cos
    }
}
