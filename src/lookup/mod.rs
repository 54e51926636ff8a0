//! Lookup Tables
//!
//! Overlap as a function of achievement, precomputed once per run so the
//! per-student, per-step loop never integrates.
//!
//! - one table per (version, row) of the school curricula, plus one home table
//! - every table samples `integration_points` evenly spaced achievement values
//!   over [0, max_achievement]
//! - reads interpolate linearly between neighbouring nodes and clamp to the
//!   edge values outside the domain, reporting that they did so

use std::time::Instant;

use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::curriculum::{Advisory, Curriculum, CurriculumSet, HomeCurriculum, Intensity};
use crate::error::{Result, SimulationError};
use crate::overlap::{overlap_profile, IntegrationGrid};

/// Result of a table read
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lookup {
    pub value: f64,
    /// The requested achievement was outside [0, max]
    pub clamped: bool,
}

/// Overlap sampled on an even achievement grid
#[derive(Clone, Debug, PartialEq)]
pub struct LookupTable {
    max: f64,
    values: Vec<f64>,
}

impl LookupTable {
    /// Rejects fewer than two points, a non-positive domain or a bad ZPD shape
    /// before integrating
    pub fn build<C: Intensity + ?Sized>(
        curriculum: &C,
        config: &SimulationConfig,
    ) -> Result<Self> {
        config.zpd.validate()?;
        let grid = IntegrationGrid::new(0.0, config.max_achievement, config.integration_points)?;
        let values = overlap_profile(&grid.nodes(), &config.zpd, curriculum, &grid);
        Ok(Self {
            max: config.max_achievement,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max_achievement(&self) -> f64 {
        self.max
    }

    // `build` guarantees at least two nodes and max > 0
    fn grid(&self) -> IntegrationGrid {
        IntegrationGrid::spanning(0.0, self.max, self.values.len())
    }

    /// Achievement values of the nodes, ascending
    pub fn nodes(&self) -> Vec<f64> {
        self.grid().nodes()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Stored overlap at node `i`, `None` past the last node
    pub fn value_at_node(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied()
    }

    /// `(achievement, overlap)` pairs in ascending achievement order
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let grid = self.grid();
        self.values.iter().enumerate().map(move |(i, &v)| (grid.node(i), v))
    }

    /// Linear interpolation; outside [0, max] the nearest edge value is used
    pub fn lookup(&self, achievement: f64) -> Lookup {
        let last = self.values.len() - 1;

        // also catches NaN
        if !(achievement >= 0.0) {
            return Lookup {
                value: self.values[0],
                clamped: true,
            };
        }
        if achievement > self.max {
            return Lookup {
                value: self.values[last],
                clamped: true,
            };
        }

        let pos = achievement / self.grid().spacing();
        let i = (pos.floor() as usize).min(last - 1);
        let frac = (pos - i as f64).clamp(0.0, 1.0);
        let (v0, v1) = (self.values[i], self.values[i + 1]);
        let value = (v0 + frac * (v1 - v0)).clamp(v0.min(v1), v0.max(v1));

        Lookup {
            value,
            clamped: false,
        }
    }
}

/// All tables for one run. Immutable once built; shared by reference.
#[derive(Clone, Debug)]
pub struct LookupTables {
    /// Version-major: index = version * rows + row
    school: Vec<LookupTable>,
    home: LookupTable,
    versions: usize,
    rows: usize,
    advisories: Vec<Advisory>,
}

impl LookupTables {
    /// Validate every input, then integrate. Tables are built in parallel; the
    /// output order is fixed by index so values never depend on scheduling.
    pub fn build(
        config: &SimulationConfig,
        curricula: &CurriculumSet,
        home: &HomeCurriculum,
    ) -> Result<Self> {
        config.validate()?;
        home.validate()?;
        for (version, row, curriculum) in curricula.iter() {
            curriculum.validate(version, row)?;
            if curriculum.start >= config.max_achievement {
                return Err(SimulationError::EmptyCurriculumDomain { version, row });
            }
        }

        let advisories = curricula.advisories();
        for advisory in &advisories {
            tracing::warn!(%advisory, "curriculum advisory");
        }
        if config.use_gpu {
            tracing::warn!("GPU offload requested but not available, using CPU");
        }

        let started = Instant::now();
        let units: Vec<&Curriculum> = curricula.iter().map(|(_, _, c)| c).collect();
        let school = units
            .par_iter()
            .map(|c| LookupTable::build(*c, config))
            .collect::<Result<Vec<LookupTable>>>()?;
        let home = LookupTable::build(home, config)?;

        tracing::debug!(
            tables = school.len() + 1,
            points = config.integration_points,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "lookup tables built"
        );

        Ok(Self {
            school,
            home,
            versions: curricula.version_count(),
            rows: curricula.row_count(),
            advisories,
        })
    }

    pub fn school(&self, version: usize, row: usize) -> &LookupTable {
        &self.school[version * self.rows + row]
    }

    pub fn home(&self) -> &LookupTable {
        &self.home
    }

    pub fn version_count(&self) -> usize {
        self.versions
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ZpdShape;

    fn config(points: usize) -> SimulationConfig {
        SimulationConfig {
            integration_points: points,
            zpd: ZpdShape { width: 0.02, offset: 0.0 },
            ..Default::default()
        }
    }

    fn grade() -> Curriculum {
        Curriculum::new(0.4, 0.1, 50.0, 50.0)
    }

    #[test]
    fn test_table_size_and_order() {
        let table = LookupTable::build(&grade(), &config(101)).unwrap();
        assert_eq!(table.len(), 101);
        let nodes = table.nodes();
        assert_eq!(nodes[0], 0.0);
        assert_eq!(nodes[100], 1.0);
        assert!(nodes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.pairs().count(), 101);
    }

    #[test]
    fn test_value_at_node() {
        let table = LookupTable::build(&grade(), &config(101)).unwrap();
        assert_eq!(table.value_at_node(0), Some(table.values()[0]));
        assert_eq!(table.value_at_node(45), Some(table.values()[45]));
        assert_eq!(table.value_at_node(100), Some(table.values()[100]));
        assert_eq!(table.value_at_node(101), None);
    }

    #[test]
    fn test_single_table_rejects_degenerate_grid() {
        for points in [0, 1] {
            assert!(matches!(
                LookupTable::build(&HomeCurriculum::default(), &config(points)),
                Err(SimulationError::InvalidParameter { name: "integration_points", .. })
            ));
        }
        let no_domain = SimulationConfig {
            max_achievement: 0.0,
            ..config(101)
        };
        assert!(LookupTable::build(&grade(), &no_domain).is_err());
        let flat_zpd = SimulationConfig {
            zpd: ZpdShape { width: 0.0, offset: 0.0 },
            ..config(101)
        };
        assert!(LookupTable::build(&grade(), &flat_zpd).is_err());

        let smallest = LookupTable::build(&grade(), &config(2)).unwrap();
        assert!(smallest.lookup(0.5).value.is_finite());
    }

    #[test]
    fn test_lookup_hits_nodes_exactly() {
        let table = LookupTable::build(&grade(), &config(101)).unwrap();
        for (x, v) in table.pairs() {
            let hit = table.lookup(x);
            assert!(!hit.clamped);
            assert!((hit.value - v).abs() < 1e-15);
        }
    }

    #[test]
    fn test_lookup_interpolates_between_neighbours() {
        let table = LookupTable::build(&grade(), &config(101)).unwrap();
        let values = table.values();
        for i in 0..100 {
            let mid = (i as f64 + 0.37) / 100.0;
            let v = table.lookup(mid).value;
            let lo = values[i].min(values[i + 1]);
            let hi = values[i].max(values[i + 1]);
            assert!(v >= lo && v <= hi);
        }
    }

    #[test]
    fn test_lookup_clamps_outside_domain() {
        let table = LookupTable::build(&HomeCurriculum::new(1.0), &config(101)).unwrap();
        let below = table.lookup(-0.5);
        assert!(below.clamped);
        assert_eq!(below.value, table.values()[0]);
        let above = table.lookup(1.5);
        assert!(above.clamped);
        assert_eq!(above.value, table.values()[100]);
        assert!(table.lookup(f64::NAN).clamped);
        assert!(!table.lookup(1.0).clamped);
    }

    #[test]
    fn test_build_all_tables() {
        let curricula = CurriculumSet::new(vec![
            vec![grade(), Curriculum::new(0.5, 0.1, 50.0, 50.0)],
            vec![Curriculum::new(0.3, 0.1, 50.0, 50.0), grade()],
        ])
        .unwrap();
        let tables =
            LookupTables::build(&config(201), &curricula, &HomeCurriculum::default()).unwrap();
        assert_eq!(tables.version_count(), 2);
        assert_eq!(tables.row_count(), 2);
        assert_eq!(tables.school(0, 0), tables.school(1, 1));
        assert_ne!(tables.school(0, 1), tables.school(1, 0));
        assert_eq!(tables.home().len(), 201);
        assert!(tables.advisories().is_empty());
    }

    #[test]
    fn test_build_rejects_curriculum_beyond_domain() {
        let curricula = CurriculumSet::new(vec![vec![Curriculum::new(1.2, 0.1, 10.0, 10.0)]])
            .unwrap();
        assert!(matches!(
            LookupTables::build(&config(101), &curricula, &HomeCurriculum::default()),
            Err(SimulationError::EmptyCurriculumDomain { version: 0, row: 0 })
        ));
    }

    #[test]
    fn test_build_rejects_bad_config_before_integrating() {
        let curricula = CurriculumSet::new(vec![vec![grade()]]).unwrap();
        let bad = SimulationConfig {
            integration_points: 0,
            ..Default::default()
        };
        assert!(LookupTables::build(&bad, &curricula, &HomeCurriculum::default()).is_err());
    }

    #[test]
    fn test_build_collects_advisories() {
        let curricula =
            CurriculumSet::new(vec![vec![Curriculum::new(0.05, 0.1, 5.0, 50.0)]]).unwrap();
        let tables =
            LookupTables::build(&config(101), &curricula, &HomeCurriculum::default()).unwrap();
        assert_eq!(tables.advisories().len(), 2);
    }
}
