//! Common Types and Constants
//!
//! Shared data structures used across the simulation modules.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::sanitize::{require_all_non_negative, require_finite, require_length, require_positive};

// ==================== Constants ====================

/// Default number of integration points (grid nodes per lookup table)
pub const DEFAULT_INTEGRATION_POINTS: usize = 2000;

/// Default ZPD spread
pub const DEFAULT_ZPD_WIDTH: f64 = 0.05;

/// Default ZPD asymmetry relative to current achievement
pub const DEFAULT_ZPD_OFFSET: f64 = 0.0;

/// Default share of growth attributed to school on school days
pub const DEFAULT_DOSAGE: f64 = 0.8;

/// Default upper bound of the achievement domain
pub const DEFAULT_MAX_ACHIEVEMENT: f64 = 1.0;

/// Default decay rate of the home curriculum intensity
pub const DEFAULT_HOME_DECAY_RATE: f64 = 1.0;

/// Default number of steps between progress events
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

// ==================== ZPD ====================

/// Receptivity curve shape, shared by every student in a run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZpdShape {
    /// Spread of the bell curve
    pub width: f64,
    /// Shift of the curve's center relative to current achievement
    pub offset: f64,
}

impl Default for ZpdShape {
    fn default() -> Self {
        Self {
            width: DEFAULT_ZPD_WIDTH,
            offset: DEFAULT_ZPD_OFFSET,
        }
    }
}

impl ZpdShape {
    pub fn validate(&self) -> Result<()> {
        require_positive("zpd.width", self.width)?;
        require_finite("zpd.offset", self.offset)
    }
}

// ==================== Students ====================

/// Per-student rates that stay fixed for the whole run
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StudentParams {
    pub learning_rate: f64,
    pub decay_rate: f64,
    pub home_env: f64,
}

/// Column-oriented student data. All vectors share one length, the cohort size.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cohort {
    /// Initial achievement, >= 0
    pub achievement: Vec<f64>,
    pub learning_rate: Vec<f64>,
    pub decay_rate: Vec<f64>,
    /// Home-environment quality, >= 0
    pub home_env: Vec<f64>,
    /// Curriculum version followed by each student (0-based)
    pub version: Vec<usize>,
}

impl Cohort {
    pub fn len(&self) -> usize {
        self.achievement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.achievement.is_empty()
    }

    pub fn student(&self, i: usize) -> StudentParams {
        StudentParams {
            learning_rate: self.learning_rate[i],
            decay_rate: self.decay_rate[i],
            home_env: self.home_env[i],
        }
    }

    /// Check lengths and ranges. Version selectors are checked against the
    /// curriculum set separately, see [`Cohort::validate_versions`].
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        if n == 0 {
            return Err(SimulationError::invalid(
                "achievement",
                "cohort must contain at least one student",
            ));
        }
        require_length("learning_rate", n, self.learning_rate.len())?;
        require_length("decay_rate", n, self.decay_rate.len())?;
        require_length("home_env", n, self.home_env.len())?;
        require_length("version", n, self.version.len())?;

        require_all_non_negative("achievement", &self.achievement)?;
        require_all_non_negative("learning_rate", &self.learning_rate)?;
        require_all_non_negative("decay_rate", &self.decay_rate)?;
        require_all_non_negative("home_env", &self.home_env)
    }

    pub fn validate_versions(&self, versions: usize) -> Result<()> {
        match self.version.iter().position(|&v| v >= versions) {
            None => Ok(()),
            Some(student) => Err(SimulationError::UnknownVersion {
                student,
                version: self.version[student],
                versions,
            }),
        }
    }
}

// ==================== Assignment ====================

/// What a single time step delivers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    NoSchool,
    /// 0-based curriculum row
    Curriculum(usize),
}

/// Ordered per-step schedule; its length is the number of simulated steps
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub sessions: Vec<Session>,
}

impl Assignment {
    /// Build from raw codes: `0` means no school, `k >= 1` selects curriculum row `k`
    /// (1-based).
    pub fn from_codes(codes: &[usize]) -> Self {
        let sessions = codes
            .iter()
            .map(|&code| match code {
                0 => Session::NoSchool,
                k => Session::Curriculum(k - 1),
            })
            .collect();
        Self { sessions }
    }

    /// Inverse of [`Assignment::from_codes`]
    pub fn codes(&self) -> Vec<usize> {
        self.sessions
            .iter()
            .map(|s| match s {
                Session::NoSchool => 0,
                Session::Curriculum(row) => row + 1,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn school_days(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| matches!(s, Session::Curriculum(_)))
            .count()
    }

    pub fn validate(&self, rows: usize) -> Result<()> {
        if self.sessions.is_empty() {
            return Err(SimulationError::invalid(
                "assignment",
                "at least one time step is required",
            ));
        }
        for (step, session) in self.sessions.iter().enumerate() {
            if let Session::Curriculum(row) = *session {
                if row >= rows {
                    return Err(SimulationError::UnknownCurriculumRow {
                        step,
                        row: row + 1,
                        rows,
                    });
                }
            }
        }
        Ok(())
    }
}

// ==================== Policies ====================

/// How each student's curriculum version is chosen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// The cohort's selector holds for the whole run
    #[default]
    Fixed,
    /// On each school step, follow the version with the largest overlap at the
    /// current achievement
    Adaptive,
}

/// Lookups outside the table domain
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPolicy {
    /// Read the nearest edge value and count the event
    #[default]
    Clamp,
    /// Fail the run
    Reject,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One row per student, one column per step
    #[default]
    Wide,
    /// One row per student and step
    Long,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wide" => Some(OutputFormat::Wide),
            "long" => Some(OutputFormat::Long),
            _ => None,
        }
    }
}
