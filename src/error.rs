//! Error types
//!
//! All validation happens before any integration or simulation work starts, so
//! every variant except `OutOfDomain` and `Worker` describes a bad input.

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("length mismatch for `{name}`: expected {expected} students, got {actual}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("assignment step {step} references curriculum row {row}, but only {rows} rows exist")]
    UnknownCurriculumRow { step: usize, row: usize, rows: usize },

    #[error("student {student} selects version {version}, but only {versions} versions exist")]
    UnknownVersion {
        student: usize,
        version: usize,
        versions: usize,
    },

    #[error("curriculum version {version} row {row} has an empty full-intensity domain")]
    EmptyCurriculumDomain { version: usize, row: usize },

    #[error(
        "student {student} left the table domain at step {step}: achievement {achievement} outside [0, {max}]"
    )]
    OutOfDomain {
        student: usize,
        step: usize,
        achievement: f64,
        max: f64,
    },

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("worker starting at student {first_student} failed: {source}")]
    Worker {
        first_student: usize,
        #[source]
        source: Box<SimulationError>,
    },
}

pub type Result<T> = std::result::Result<T, SimulationError>;

impl SimulationError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
