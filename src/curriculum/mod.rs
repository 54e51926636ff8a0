//! Curriculum Intensity
//!
//! Instructional density as a function of achievement.
//!
//! School curricula are piecewise:
//! - full intensity (1.0) on the plateau [start, start + width]
//! - review leg below the plateau: max(0, 1 - review_slope * (start - x))^shape
//! - advanced leg above the plateau: max(0, 1 - advanced_slope * (x - end))^shape
//!
//! Both legs reach zero at distance 1/slope from the plateau, so larger slopes
//! mean narrower legs. The home curriculum is a decaying exponential
//! exp(-(decay_rate * x)^shape): home instruction concentrates on early
//! content, and shape 1 is the plain exponential.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::sanitize::{require_length, require_non_negative, require_positive};
use crate::types::DEFAULT_HOME_DECAY_RATE;

/// Anything the overlap integrator can pair with a ZPD curve
pub trait Intensity {
    fn intensity(&self, x: f64) -> f64;
}

// ==================== School ====================

/// One grade / curriculum row
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curriculum {
    /// Achievement where full intensity begins
    pub start: f64,
    /// Length of the full-intensity plateau
    pub width: f64,
    /// Fade slope of the review leg (below start)
    pub review_slope: f64,
    /// Fade slope of the advanced leg (above end)
    pub advanced_slope: f64,
    /// Leg curvature; 1.0 gives linear ramps
    #[serde(default = "default_shape")]
    pub shape: f64,
}

fn default_shape() -> f64 {
    1.0
}

impl Curriculum {
    pub fn new(start: f64, width: f64, review_slope: f64, advanced_slope: f64) -> Self {
        Self {
            start,
            width,
            review_slope,
            advanced_slope,
            shape: 1.0,
        }
    }

    pub fn with_shape(mut self, shape: f64) -> Self {
        self.shape = shape;
        self
    }

    pub fn end(&self) -> f64 {
        self.start + self.width
    }

    /// Interval outside of which intensity is exactly zero
    pub fn support(&self) -> (f64, f64) {
        (
            self.start - 1.0 / self.review_slope,
            self.end() + 1.0 / self.advanced_slope,
        )
    }

    pub fn validate(&self, version: usize, row: usize) -> Result<()> {
        require_non_negative("curriculum.start", self.start)?;
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(SimulationError::EmptyCurriculumDomain { version, row });
        }
        require_positive("curriculum.review_slope", self.review_slope)?;
        require_positive("curriculum.advanced_slope", self.advanced_slope)?;
        require_positive("curriculum.shape", self.shape)
    }

    /// Slope/width combinations that are legal but probably unintended
    pub fn advisories(&self, version: usize, row: usize) -> Vec<Advisory> {
        let mut out = Vec::new();
        let review_span = 1.0 / self.review_slope;
        let advanced_span = 1.0 / self.advanced_slope;

        if self.start - review_span < 0.0 {
            out.push(Advisory {
                version,
                row,
                kind: AdvisoryKind::ReviewBelowFloor,
            });
        }
        if review_span > self.width {
            out.push(Advisory {
                version,
                row,
                kind: AdvisoryKind::ReviewWiderThanPlateau,
            });
        }
        if advanced_span > self.width {
            out.push(Advisory {
                version,
                row,
                kind: AdvisoryKind::AdvancedWiderThanPlateau,
            });
        }
        out
    }
}

impl Intensity for Curriculum {
    fn intensity(&self, x: f64) -> f64 {
        let end = self.end();
        let ramp = if x < self.start {
            1.0 - self.review_slope * (self.start - x)
        } else if x > end {
            1.0 - self.advanced_slope * (x - end)
        } else {
            return 1.0;
        };

        if ramp <= 0.0 {
            0.0
        } else if self.shape == 1.0 {
            ramp
        } else {
            ramp.powf(self.shape)
        }
    }
}

// ==================== Home ====================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomeCurriculum {
    pub decay_rate: f64,
    /// Stretch exponent of the decay, > 0
    #[serde(default = "default_shape")]
    pub shape: f64,
}

impl Default for HomeCurriculum {
    fn default() -> Self {
        Self::new(DEFAULT_HOME_DECAY_RATE)
    }
}

impl HomeCurriculum {
    pub fn new(decay_rate: f64) -> Self {
        Self {
            decay_rate,
            shape: 1.0,
        }
    }

    pub fn with_shape(mut self, shape: f64) -> Self {
        self.shape = shape;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_non_negative("home.decay_rate", self.decay_rate)?;
        require_positive("home.shape", self.shape)
    }
}

impl Intensity for HomeCurriculum {
    fn intensity(&self, x: f64) -> f64 {
        if x < 0.0 {
            0.0
        } else if self.shape == 1.0 {
            (-self.decay_rate * x).exp()
        } else {
            (-(self.decay_rate * x).powf(self.shape)).exp()
        }
    }
}

// ==================== Curriculum Set ====================

/// `versions × rows` grid. Version 0 is usually the typical track; extra
/// versions (remedial, advanced, ...) must define the same number of rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Curriculum>>", into = "Vec<Vec<Curriculum>>")]
pub struct CurriculumSet {
    versions: Vec<Vec<Curriculum>>,
}

impl TryFrom<Vec<Vec<Curriculum>>> for CurriculumSet {
    type Error = SimulationError;

    fn try_from(versions: Vec<Vec<Curriculum>>) -> Result<Self> {
        Self::new(versions)
    }
}

impl From<CurriculumSet> for Vec<Vec<Curriculum>> {
    fn from(set: CurriculumSet) -> Self {
        set.versions
    }
}

impl CurriculumSet {
    pub fn new(versions: Vec<Vec<Curriculum>>) -> Result<Self> {
        let rows = versions.first().map(Vec::len).unwrap_or(0);
        if rows == 0 {
            return Err(SimulationError::invalid(
                "curricula",
                "at least one version with at least one row is required",
            ));
        }
        if let Some(v) = versions.iter().position(|rowset| rowset.len() != rows) {
            return Err(SimulationError::invalid(
                "curricula",
                format!(
                    "version {v} has {} rows, version 0 has {rows}",
                    versions[v].len()
                ),
            ));
        }
        for (v, rowset) in versions.iter().enumerate() {
            for (r, curriculum) in rowset.iter().enumerate() {
                curriculum.validate(v, r)?;
            }
        }
        Ok(Self { versions })
    }

    /// Single version from parallel per-row vectors, linear legs
    pub fn from_columns(
        starts: &[f64],
        widths: &[f64],
        review_slopes: &[f64],
        advanced_slopes: &[f64],
    ) -> Result<Self> {
        let rows = starts.len();
        require_length("curriculum.widths", rows, widths.len())?;
        require_length("curriculum.review_slopes", rows, review_slopes.len())?;
        require_length(
            "curriculum.advanced_slopes",
            rows,
            advanced_slopes.len(),
        )?;

        let row_set = (0..rows)
            .map(|r| Curriculum::new(starts[r], widths[r], review_slopes[r], advanced_slopes[r]))
            .collect();
        Self::new(vec![row_set])
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn row_count(&self) -> usize {
        self.versions[0].len()
    }

    pub fn get(&self, version: usize, row: usize) -> Option<&Curriculum> {
        self.versions.get(version).and_then(|rows| rows.get(row))
    }

    /// `(version, row, curriculum)` in version-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Curriculum)> {
        self.versions.iter().enumerate().flat_map(|(v, rows)| {
            rows.iter().enumerate().map(move |(r, c)| (v, r, c))
        })
    }

    pub fn advisories(&self) -> Vec<Advisory> {
        self.iter()
            .flat_map(|(v, r, c)| c.advisories(v, r))
            .collect()
    }
}

// ==================== Advisories ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    /// start - 1/review_slope < 0
    ReviewBelowFloor,
    ReviewWiderThanPlateau,
    AdvancedWiderThanPlateau,
}

/// Non-fatal curriculum warning
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub version: usize,
    pub row: usize,
    pub kind: AdvisoryKind,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            AdvisoryKind::ReviewBelowFloor => "review leg extends below achievement 0",
            AdvisoryKind::ReviewWiderThanPlateau => "review leg is wider than the plateau",
            AdvisoryKind::AdvancedWiderThanPlateau => "advanced leg is wider than the plateau",
        };
        write!(f, "version {} row {}: {}", self.version, self.row + 1, what)
    }
}
