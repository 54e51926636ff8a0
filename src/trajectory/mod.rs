//! Trajectory Driver
//!
//! Builds the lookup tables once, then runs the update step for every entry of
//! the assignment sequence and records each student's achievement after every
//! step.
//!
//! Two execution modes:
//! - sequential: one loop over all students
//! - parallel: students split into contiguous chunks, each chunk runs the full
//!   time loop on its own rayon worker against the shared tables
//!
//! Both modes produce identical numbers: a student's trajectory depends only on
//! that student's inputs and the immutable tables. Chunk outputs are put back
//! in student order before the result is assembled.

use std::ops::Range;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::curriculum::{Advisory, CurriculumSet, HomeCurriculum};
use crate::error::{Result, SimulationError};
use crate::lookup::LookupTables;
use crate::types::{Assignment, Cohort, OutputFormat};
use crate::update::{advance_cohort, CohortSlice, StepContext};

// ==================== Result Types ====================

/// Everything needed to interpret a set of trajectories
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    pub assignment: Assignment,
    pub config: SimulationConfig,
    pub advisories: Vec<Advisory>,
    /// Table reads outside [0, max_achievement], summed over students and steps
    pub clamped_lookups: u64,
    /// 1 for sequential runs
    pub workers: usize,
}

/// One row of the long layout
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub student: usize,
    /// Version followed on this step
    pub version: usize,
    /// 1-based time step
    pub step: usize,
    pub achievement: f64,
}

/// One row of the wide layout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub student: usize,
    /// Version the student started with
    pub version: usize,
    /// Version followed on steps 1..=T
    pub followed: Vec<usize>,
    /// Achievement after steps 1..=T
    pub achievement: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "rows", rename_all = "snake_case")]
pub enum TrajectoryTable {
    Wide(Vec<WideRow>),
    Long(Vec<LongRecord>),
}

/// Simulated achievement, one row per student, one column per step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trajectories {
    student_ids: Vec<usize>,
    /// Version selector each student started with
    versions: Vec<usize>,
    initial: Vec<f64>,
    steps: usize,
    /// Row-major `students × steps`
    values: Vec<f64>,
    /// Version followed on each step, same layout as `values`
    followed: Vec<usize>,
    metadata: RunMetadata,
}

impl Trajectories {
    pub fn student_count(&self) -> usize {
        self.student_ids.len()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn student_ids(&self) -> &[usize] {
        &self.student_ids
    }

    pub fn versions(&self) -> &[usize] {
        &self.versions
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    /// Whole matrix, row-major
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Trajectory of one student
    pub fn row(&self, student: usize) -> &[f64] {
        &self.values[student * self.steps..(student + 1) * self.steps]
    }

    /// Versions followed by one student, one per step. Under the fixed policy
    /// every entry is the starting selector.
    pub fn followed_versions(&self, student: usize) -> &[usize] {
        &self.followed[student * self.steps..(student + 1) * self.steps]
    }

    /// Achievement of `student` after 0-based step `step`
    pub fn at(&self, student: usize, step: usize) -> f64 {
        self.values[student * self.steps + step]
    }

    pub fn final_achievement(&self) -> Vec<f64> {
        (0..self.student_count())
            .map(|s| self.at(s, self.steps - 1))
            .collect()
    }

    /// Final minus initial achievement, per student
    pub fn gains(&self) -> Vec<f64> {
        self.final_achievement()
            .iter()
            .zip(&self.initial)
            .map(|(last, first)| last - first)
            .collect()
    }

    pub fn wide_rows(&self) -> Vec<WideRow> {
        (0..self.student_count())
            .map(|s| WideRow {
                student: self.student_ids[s],
                version: self.versions[s],
                followed: self.followed_versions(s).to_vec(),
                achievement: self.row(s).to_vec(),
            })
            .collect()
    }

    /// Student-major, then step
    pub fn long_records(&self) -> Vec<LongRecord> {
        let mut out = Vec::with_capacity(self.values.len());
        for s in 0..self.student_count() {
            let followed = self.followed_versions(s);
            for (t, &achievement) in self.row(s).iter().enumerate() {
                out.push(LongRecord {
                    student: self.student_ids[s],
                    version: followed[t],
                    step: t + 1,
                    achievement,
                });
            }
        }
        out
    }

    pub fn table(&self, format: OutputFormat) -> TrajectoryTable {
        match format {
            OutputFormat::Wide => TrajectoryTable::Wide(self.wide_rows()),
            OutputFormat::Long => TrajectoryTable::Long(self.long_records()),
        }
    }

    /// Layout chosen by the run's `output_format`
    pub fn formatted(&self) -> TrajectoryTable {
        self.table(self.metadata.config.output_format)
    }
}

// ==================== Driver ====================

/// Output of one contiguous range of students
struct ChunkOutput {
    first_student: usize,
    values: Vec<f64>,
    followed: Vec<usize>,
    clamped: u64,
}

/// A validated run setup with its lookup tables already built
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    assignment: Assignment,
    tables: LookupTables,
}

impl Simulation {
    /// Validate all run-level inputs and build the lookup tables
    pub fn new(
        config: SimulationConfig,
        curricula: &CurriculumSet,
        home: &HomeCurriculum,
        assignment: Assignment,
    ) -> Result<Self> {
        config.validate()?;
        assignment.validate(curricula.row_count())?;
        let tables = LookupTables::build(&config, curricula, home)?;

        Ok(Self {
            config,
            assignment,
            tables,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Sequential when `config.workers` is `None`, parallel otherwise
    pub fn run(&self, cohort: &Cohort) -> Result<Trajectories> {
        match self.config.workers {
            None => self.run_sequential(cohort),
            Some(workers) => self.run_parallel(cohort, workers),
        }
    }

    pub fn run_sequential(&self, cohort: &Cohort) -> Result<Trajectories> {
        self.validate_cohort(cohort)?;
        let started = Instant::now();

        let chunk = self.simulate_range(cohort, 0..cohort.len(), self.config.verbose)?;
        let result = self.assemble(cohort, vec![chunk], 1);

        tracing::info!(
            students = cohort.len(),
            steps = self.assignment.len(),
            clamped_lookups = result.metadata.clamped_lookups,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sequential simulation finished"
        );
        Ok(result)
    }

    /// Partition students across `workers` threads. Any failing chunk fails
    /// the run.
    pub fn run_parallel(&self, cohort: &Cohort, workers: usize) -> Result<Trajectories> {
        if workers == 0 {
            return Err(SimulationError::invalid("workers", "must be at least 1"));
        }
        self.validate_cohort(cohort)?;
        let started = Instant::now();

        let ranges = partition(cohort.len(), workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;

        let outputs: Vec<Result<ChunkOutput>> = pool.install(|| {
            ranges
                .par_iter()
                .map(|range| {
                    let out = self.simulate_range(cohort, range.clone(), false);
                    if self.config.verbose {
                        tracing::info!(
                            first_student = range.start,
                            students = range.len(),
                            "worker finished"
                        );
                    }
                    out
                })
                .collect()
        });

        let mut chunks = Vec::with_capacity(outputs.len());
        for (range, output) in ranges.iter().zip(outputs) {
            chunks.push(output.map_err(|source| SimulationError::Worker {
                first_student: range.start,
                source: Box::new(source),
            })?);
        }
        chunks.sort_by_key(|c| c.first_student);
        let result = self.assemble(cohort, chunks, workers);

        tracing::info!(
            students = cohort.len(),
            steps = self.assignment.len(),
            workers,
            clamped_lookups = result.metadata.clamped_lookups,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "parallel simulation finished"
        );
        Ok(result)
    }

    fn validate_cohort(&self, cohort: &Cohort) -> Result<()> {
        cohort.validate()?;
        cohort.validate_versions(self.tables.version_count())
    }

    /// Full time loop for `range` of the cohort
    fn simulate_range(
        &self,
        cohort: &Cohort,
        range: Range<usize>,
        report_progress: bool,
    ) -> Result<ChunkOutput> {
        let steps = self.assignment.len();
        let slice = CohortSlice {
            offset: range.start,
            learning_rate: &cohort.learning_rate[range.clone()],
            decay_rate: &cohort.decay_rate[range.clone()],
            home_env: &cohort.home_env[range.clone()],
        };
        let mut achievement = cohort.achievement[range.clone()].to_vec();
        let mut versions = cohort.version[range.clone()].to_vec();
        let mut values = vec![0.0; range.len() * steps];
        let mut followed = vec![0; range.len() * steps];
        let mut clamped = 0;

        for (step, &session) in self.assignment.sessions.iter().enumerate() {
            let ctx = StepContext {
                step,
                session,
                config: &self.config,
                tables: &self.tables,
            };
            clamped += advance_cohort(&slice, &mut achievement, &mut versions, &ctx)?;

            for (s, (&a, &v)) in achievement.iter().zip(&versions).enumerate() {
                values[s * steps + step] = a;
                followed[s * steps + step] = v;
            }

            if report_progress && (step + 1) % self.config.progress_every == 0 {
                tracing::info!(step = step + 1, steps, "simulation progress");
            }
        }

        Ok(ChunkOutput {
            first_student: range.start,
            values,
            followed,
            clamped,
        })
    }

    /// Concatenate chunks, already in student order
    fn assemble(&self, cohort: &Cohort, chunks: Vec<ChunkOutput>, workers: usize) -> Trajectories {
        let cells = cohort.len() * self.assignment.len();
        let mut values = Vec::with_capacity(cells);
        let mut followed = Vec::with_capacity(cells);
        let mut clamped_lookups = 0;
        for chunk in chunks {
            values.extend_from_slice(&chunk.values);
            followed.extend_from_slice(&chunk.followed);
            clamped_lookups += chunk.clamped;
        }
        if clamped_lookups > 0 {
            tracing::debug!(clamped_lookups, "achievement left the table domain and was clamped");
        }

        Trajectories {
            student_ids: (0..cohort.len()).collect(),
            versions: cohort.version.clone(),
            initial: cohort.achievement.clone(),
            steps: self.assignment.len(),
            values,
            followed,
            metadata: RunMetadata {
                assignment: self.assignment.clone(),
                config: self.config.clone(),
                advisories: self.tables.advisories().to_vec(),
                clamped_lookups,
                workers,
            },
        }
    }
}

/// Split `0..n` into at most `workers` contiguous, non-empty ranges whose
/// sizes differ by at most one
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.clamp(1, n.max(1));
    let base = n / workers;
    let extra = n % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let len = base + usize::from(w < extra);
        if len > 0 {
            ranges.push(start..start + len);
        }
        start += len;
    }
    ranges
}

/// Build tables and run in one call
pub fn simulate(
    config: SimulationConfig,
    cohort: &Cohort,
    curricula: &CurriculumSet,
    home: &HomeCurriculum,
    assignment: Assignment,
) -> Result<Trajectories> {
    Simulation::new(config, curricula, home, assignment)?.run(cohort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::Curriculum;
    use crate::types::ZpdShape;

    fn setup(workers: Option<usize>) -> (Simulation, Cohort) {
        let config = SimulationConfig {
            integration_points: 301,
            zpd: ZpdShape { width: 0.03, offset: 0.0 },
            workers,
            ..Default::default()
        };
        let curricula = CurriculumSet::new(vec![vec![
            Curriculum::new(0.2, 0.1, 30.0, 30.0),
            Curriculum::new(0.3, 0.1, 30.0, 30.0),
        ]])
        .unwrap();
        let assignment = Assignment::from_codes(&[0, 1, 1, 1, 2, 2, 0, 0]);
        let sim = Simulation::new(config, &curricula, &HomeCurriculum::default(), assignment)
            .unwrap();
        let cohort = Cohort {
            achievement: vec![0.1, 0.2, 0.25, 0.3, 0.5],
            learning_rate: vec![0.1, 0.2, 0.3, 0.1, 0.2],
            decay_rate: vec![0.0, 0.001, 0.0, 0.002, 0.0],
            home_env: vec![0.5, 0.1, 0.0, 1.0, 0.3],
            version: vec![0; 5],
        };
        (sim, cohort)
    }

    #[test]
    fn test_partition() {
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(partition(2, 5), vec![0..1, 1..2]);
        assert_eq!(partition(4, 1), vec![0..4]);
        assert_eq!(partition(0, 3), Vec::<Range<usize>>::new());
    }

    #[test]
    fn test_shape_of_result() {
        let (sim, cohort) = setup(None);
        let result = sim.run(&cohort).unwrap();
        assert_eq!(result.student_count(), 5);
        assert_eq!(result.steps(), 8);
        assert_eq!(result.values().len(), 40);
        assert_eq!(result.row(2).len(), 8);
        assert_eq!(result.metadata().workers, 1);
        assert_eq!(result.metadata().assignment.codes(), vec![0, 1, 1, 1, 2, 2, 0, 0]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (sim, cohort) = setup(None);
        let sequential = sim.run_sequential(&cohort).unwrap();
        for workers in 1..=7 {
            let parallel = sim.run_parallel(&cohort, workers).unwrap();
            assert_eq!(parallel.values(), sequential.values(), "workers = {workers}");
            assert_eq!(parallel.metadata().workers, workers);
        }
    }

    #[test]
    fn test_layouts() {
        let (sim, cohort) = setup(None);
        let result = sim.run(&cohort).unwrap();

        let long = result.long_records();
        assert_eq!(long.len(), 40);
        assert_eq!(long[9].student, 1);
        assert_eq!(long[9].step, 2);
        assert_eq!(long[9].achievement, result.at(1, 1));

        match result.table(OutputFormat::Wide) {
            TrajectoryTable::Wide(rows) => {
                assert_eq!(rows.len(), 5);
                assert_eq!(rows[3].achievement, result.row(3).to_vec());
            }
            other => panic!("unexpected layout: {other:?}"),
        }
        assert!(matches!(result.formatted(), TrajectoryTable::Wide(_)));
    }

    #[test]
    fn test_layouts_report_followed_version() {
        let config = SimulationConfig {
            integration_points: 401,
            zpd: ZpdShape { width: 0.02, offset: 0.0 },
            version_policy: crate::types::VersionPolicy::Adaptive,
            ..Default::default()
        };
        let curricula = CurriculumSet::new(vec![
            vec![Curriculum::new(0.2, 0.1, 50.0, 50.0)],
            vec![Curriculum::new(0.5, 0.1, 50.0, 50.0)],
        ])
        .unwrap();
        let sim = Simulation::new(
            config,
            &curricula,
            &HomeCurriculum::default(),
            Assignment::from_codes(&[0, 1, 1]),
        )
        .unwrap();
        let cohort = Cohort {
            achievement: vec![0.55, 0.25],
            learning_rate: vec![0.001; 2],
            decay_rate: vec![0.0; 2],
            home_env: vec![0.0; 2],
            version: vec![0, 1],
        };
        let result = sim.run(&cohort).unwrap();

        // no school on step 1, so the starting selector still holds there
        assert_eq!(result.followed_versions(0), &[0, 1, 1]);
        assert_eq!(result.followed_versions(1), &[1, 0, 0]);

        let long = result.long_records();
        let versions: Vec<usize> = long.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![0, 1, 1, 1, 0, 0]);

        let wide = result.wide_rows();
        assert_eq!(wide[0].version, 0);
        assert_eq!(wide[0].followed, vec![0, 1, 1]);
        assert_eq!(result.versions(), &[0, 1]);

        let parallel = sim.run_parallel(&cohort, 2).unwrap();
        assert_eq!(parallel.followed_versions(1), result.followed_versions(1));
    }

    #[test]
    fn test_fixed_policy_follows_selector() {
        let (sim, mut cohort) = setup(None);
        cohort.version = vec![0; 5];
        let result = sim.run(&cohort).unwrap();
        for s in 0..5 {
            assert!(result.followed_versions(s).iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_gains() {
        let (sim, cohort) = setup(None);
        let result = sim.run(&cohort).unwrap();
        let gains = result.gains();
        let finals = result.final_achievement();
        for s in 0..5 {
            assert_eq!(gains[s], finals[s] - cohort.achievement[s]);
        }
    }

    #[test]
    fn test_rejects_unknown_version() {
        let (sim, mut cohort) = setup(None);
        cohort.version[3] = 1;
        assert!(matches!(
            sim.run(&cohort),
            Err(SimulationError::UnknownVersion { student: 3, .. })
        ));
        assert!(sim.run_parallel(&cohort, 2).is_err());
    }

    #[test]
    fn test_worker_failure_fails_run() {
        let config = SimulationConfig {
            integration_points: 101,
            domain_policy: crate::types::DomainPolicy::Reject,
            ..Default::default()
        };
        let curricula = CurriculumSet::new(vec![vec![Curriculum::new(0.2, 0.1, 30.0, 30.0)]])
            .unwrap();
        let sim = Simulation::new(
            config,
            &curricula,
            &HomeCurriculum::default(),
            Assignment::from_codes(&[0, 0, 0]),
        )
        .unwrap();
        let cohort = Cohort {
            achievement: vec![0.1, 0.2, 0.99, 0.4],
            learning_rate: vec![0.0, 0.0, 5.0, 0.0],
            decay_rate: vec![0.0; 4],
            home_env: vec![1.0; 4],
            version: vec![0; 4],
        };
        match sim.run_parallel(&cohort, 2) {
            Err(SimulationError::Worker { first_student, source }) => {
                assert_eq!(first_student, 2);
                assert!(matches!(*source, SimulationError::OutOfDomain { student: 2, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            sim.run_sequential(&cohort),
            Err(SimulationError::OutOfDomain { student: 2, .. })
        ));
    }
}
