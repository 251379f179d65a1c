//! Piecewise-linear calibration through painted stake markers.
//!
//! In JSON the markers are an object keyed by inch value, e.g.
//! `{"0": 812, "10": 505, "20": 197}`. Keys are parsed as numbers and the
//! markers kept sorted by inches, so key order in the document does not
//! matter. Older resort files name the map `marker_positions`; both keys
//! are accepted.
use crate::error::InvalidCalibration;
use serde::{Deserialize, Serialize};

/// One marker: physical height and the image row it appears at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub inches: f64,
    pub row: f64,
}

impl Marker {
    pub fn new(inches: f64, row: f64) -> Self {
        Self { inches, row }
    }
}

/// Result of converting a row through markers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conversion {
    pub inches: f64,
    /// Row fell outside the outermost markers.
    pub extrapolated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerModel {
    #[serde(with = "marker_map", alias = "marker_positions")]
    pub markers: Vec<Marker>,
}

impl MarkerModel {
    /// Builds a model, sorting markers by inch value.
    pub fn new(markers: impl IntoIterator<Item = Marker>) -> Self {
        let mut markers: Vec<Marker> = markers.into_iter().collect();
        markers.sort_by(|a, b| a.inches.total_cmp(&b.inches));
        Self { markers }
    }

    pub fn validate(&self) -> Result<(), InvalidCalibration> {
        if self.markers.len() < 2 {
            return Err(InvalidCalibration::TooFewMarkers(self.markers.len()));
        }
        for m in &self.markers {
            if !(m.inches.is_finite() && m.inches >= 0.0) {
                return Err(InvalidCalibration::InvalidMarkerInches(m.inches));
            }
            if !m.row.is_finite() {
                return Err(InvalidCalibration::NonFinite {
                    field: "marker row",
                    value: m.row,
                });
            }
        }
        for pair in self.markers.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if b.inches <= a.inches {
                return Err(InvalidCalibration::NonMonotonicInches {
                    prev: a.inches,
                    next: b.inches,
                });
            }
            if b.row >= a.row {
                return Err(InvalidCalibration::NonMonotonicRows {
                    inches: b.inches,
                    row: b.row,
                });
            }
        }
        Ok(())
    }

    /// Interpolates between the bracketing markers; outside the marker span
    /// the nearest pair is extended and the result flagged.
    ///
    /// Requires a validated model.
    pub(crate) fn to_inches(&self, row: f64) -> Conversion {
        let ms = &self.markers;
        let last = ms.len() - 1;
        let (i, extrapolated) = if row > ms[0].row {
            (0, true)
        } else if row < ms[last].row {
            (last - 1, true)
        } else {
            // ms[i].row >= row >= ms[i + 1].row
            let i = ms
                .windows(2)
                .position(|p| row <= p[0].row && row >= p[1].row)
                .unwrap_or(last - 1);
            (i, false)
        };
        let (a, b) = (ms[i], ms[i + 1]);
        let inches = if row == a.row {
            a.inches
        } else if row == b.row {
            b.inches
        } else {
            a.inches + (a.row - row) * (b.inches - a.inches) / (a.row - b.row)
        };
        Conversion {
            inches,
            extrapolated,
        }
    }

    /// Inverse mapping; used to locate the zero-inch row.
    ///
    /// Requires a validated model.
    pub(crate) fn row_at(&self, inches: f64) -> f64 {
        let ms = &self.markers;
        let last = ms.len() - 1;
        let i = if inches <= ms[0].inches {
            0
        } else if inches >= ms[last].inches {
            last - 1
        } else {
            ms.windows(2)
                .position(|p| inches >= p[0].inches && inches <= p[1].inches)
                .unwrap_or(last - 1)
        };
        let (a, b) = (ms[i], ms[i + 1]);
        if inches == a.inches {
            return a.row;
        }
        a.row + (inches - a.inches) * (b.row - a.row) / (b.inches - a.inches)
    }
}

mod marker_map {
    use super::Marker;
    use serde::de::{Deserializer, Error as _, MapAccess, Visitor};
    use serde::ser::{SerializeMap, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(markers: &[Marker], ser: S) -> Result<S::Ok, S::Error> {
        let mut map = ser.serialize_map(Some(markers.len()))?;
        for m in markers {
            map.serialize_entry(&format!("{}", m.inches), &m.row)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Marker>, D::Error> {
        struct MarkerMapVisitor;

        impl<'de> Visitor<'de> for MarkerMapVisitor {
            type Value = Vec<Marker>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from inch value to pixel row")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, row)) = access.next_entry::<String, f64>()? {
                    let inches: f64 = key.trim().parse().map_err(|_| {
                        A::Error::custom(crate::error::InvalidCalibration::BadMarkerKey(
                            key.clone(),
                        ))
                    })?;
                    out.push(Marker::new(inches, row));
                }
                out.sort_by(|a, b| a.inches.total_cmp(&b.inches));
                Ok(out)
            }
        }

        de.deserialize_map(MarkerMapVisitor)
    }
}
