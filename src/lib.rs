//! # zpd-growth - synthetic achievement growth trajectories
//!
//! Simulates how a cohort's academic achievement develops when growth is
//! driven by the overlap between each student's zone of proximal development
//! (a receptivity curve centered on current achievement) and the instruction
//! delivered by school and home.
//!
//! ## Pipeline
//!
//! 1. [`curriculum`] - closed-form curriculum intensity (plateau + fading legs)
//! 2. [`overlap`] - numerical integration of ZPD × intensity
//! 3. [`lookup`] - overlap precomputed on an achievement grid, read by
//!    interpolation
//! 4. [`update`] - one time step for one student
//! 5. [`trajectory`] - the time loop, sequential or split across workers
//!
//! ## Example
//!
//! ```rust
//! use zpd_growth::{
//!     simulate, Assignment, Cohort, Curriculum, CurriculumSet, HomeCurriculum,
//!     SimulationConfig,
//! };
//!
//! let curricula = CurriculumSet::new(vec![vec![Curriculum::new(0.2, 0.1, 20.0, 20.0)]]).unwrap();
//! let cohort = Cohort {
//!     achievement: vec![0.15, 0.25],
//!     learning_rate: vec![0.1, 0.1],
//!     decay_rate: vec![0.0, 0.0],
//!     home_env: vec![0.5, 0.5],
//!     version: vec![0, 0],
//! };
//! let config = SimulationConfig { integration_points: 500, ..Default::default() };
//! let assignment = Assignment::from_codes(&[0, 1, 1, 1, 0]);
//!
//! let result = simulate(config, &cohort, &curricula, &HomeCurriculum::default(), assignment).unwrap();
//! assert_eq!(result.steps(), 5);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod curriculum;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod overlap;
pub mod sanitize;
pub mod trajectory;
pub mod types;
pub mod update;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use config::{GrowthWeights, SimulationConfig};
pub use curriculum::{Advisory, AdvisoryKind, Curriculum, CurriculumSet, HomeCurriculum, Intensity};
pub use error::{Result, SimulationError};
pub use lookup::{Lookup, LookupTable, LookupTables};
pub use overlap::{overlap, receptivity, IntegrationGrid};
pub use trajectory::{
    simulate, LongRecord, RunMetadata, Simulation, Trajectories, TrajectoryTable, WideRow,
};
pub use update::{advance_cohort, advance_student, CohortSlice, StepContext, StudentStep};
