//! Achievement Update Step
//!
//! One time step for one student, as a pure function of that student's state
//! and the shared step context:
//!
//! - home_growth  = home table at current achievement
//! - no school:     growth = lr · w_home · home_env · home_growth
//! - school row r:  growth = lr · [dosage · w_school · school(r, version)
//!                               + (1 - dosage) · w_home · home_env · home_growth]
//! - decay:         growth -= decay_rate · w_decay · achievement
//! - next = achievement + growth, optionally floored at 0 and capped at max
//!
//! Students never interact within a step, so a step over a cohort is a plain
//! loop over independent students; only the step order matters.

use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::lookup::{LookupTable, LookupTables};
use crate::types::{DomainPolicy, Session, StudentParams, VersionPolicy};

/// Everything shared by all students on one step
#[derive(Clone, Copy, Debug)]
pub struct StepContext<'a> {
    /// 0-based step index
    pub step: usize,
    pub session: Session,
    pub config: &'a SimulationConfig,
    pub tables: &'a LookupTables,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StudentStep {
    pub achievement: f64,
    /// Version followed on this step
    pub version: usize,
    /// Table reads that fell outside the table domain
    pub clamped_lookups: u64,
}

/// Read a table, applying the configured out-of-domain policy
fn read(
    table: &LookupTable,
    achievement: f64,
    student: usize,
    ctx: &StepContext<'_>,
) -> Result<(f64, bool)> {
    let hit = table.lookup(achievement);
    if hit.clamped && ctx.config.domain_policy == DomainPolicy::Reject {
        return Err(SimulationError::OutOfDomain {
            student,
            step: ctx.step,
            achievement,
            max: table.max_achievement(),
        });
    }
    Ok((hit.value, hit.clamped))
}

/// Version with the largest school overlap at `achievement`; ties keep the
/// lowest index
fn best_version(tables: &LookupTables, row: usize, achievement: f64) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for version in 0..tables.version_count() {
        let value = tables.school(version, row).lookup(achievement).value;
        if value > best_value {
            best = version;
            best_value = value;
        }
    }
    best
}

/// Advance one student by one step
pub fn advance_student(
    student: usize,
    achievement: f64,
    params: StudentParams,
    version: usize,
    ctx: &StepContext<'_>,
) -> Result<StudentStep> {
    let config = ctx.config;
    let weights = &config.weights;

    let (home_growth, home_clamped) = read(ctx.tables.home(), achievement, student, ctx)?;
    let home_term = weights.home * params.home_env * home_growth;

    let (growth, version) = match ctx.session {
        Session::NoSchool => (params.learning_rate * home_term, version),
        Session::Curriculum(row) => {
            let version = match config.version_policy {
                VersionPolicy::Fixed => version,
                VersionPolicy::Adaptive => best_version(ctx.tables, row, achievement),
            };
            let (school_growth, _) =
                read(ctx.tables.school(version, row), achievement, student, ctx)?;
            let blended = config.dosage * weights.school * school_growth
                + (1.0 - config.dosage) * home_term;
            (params.learning_rate * blended, version)
        }
    };

    let decay = params.decay_rate * weights.decay * achievement;
    let mut next = achievement + growth - decay;
    if config.floor_at_zero {
        next = next.max(0.0);
    }
    if config.cap_at_max {
        next = next.min(config.max_achievement);
    }

    Ok(StudentStep {
        achievement: next,
        version,
        // all tables share one domain, so one read tells for the whole step
        clamped_lookups: u64::from(home_clamped),
    })
}

/// Borrowed per-student rates for a contiguous range of the cohort
#[derive(Clone, Copy, Debug)]
pub struct CohortSlice<'a> {
    /// Cohort index of the first student in the slice
    pub offset: usize,
    pub learning_rate: &'a [f64],
    pub decay_rate: &'a [f64],
    pub home_env: &'a [f64],
}

impl CohortSlice<'_> {
    pub fn len(&self) -> usize {
        self.learning_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learning_rate.is_empty()
    }

    fn params(&self, i: usize) -> StudentParams {
        StudentParams {
            learning_rate: self.learning_rate[i],
            decay_rate: self.decay_rate[i],
            home_env: self.home_env[i],
        }
    }
}

/// Advance every student of `slice` in place. Returns the number of clamped
/// table reads.
pub fn advance_cohort(
    slice: &CohortSlice<'_>,
    achievement: &mut [f64],
    versions: &mut [usize],
    ctx: &StepContext<'_>,
) -> Result<u64> {
    let mut clamped = 0;
    for i in 0..slice.len() {
        let next = advance_student(
            slice.offset + i,
            achievement[i],
            slice.params(i),
            versions[i],
            ctx,
        )?;
        achievement[i] = next.achievement;
        versions[i] = next.version;
        clamped += next.clamped_lookups;
    }
    Ok(clamped)
}
