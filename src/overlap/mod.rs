//! Overlap Integrator
//!
//! Alignment between a student's receptivity curve and a curriculum:
//!
//!   overlap(a) = ∫ zpd(x; a + offset, width) · intensity(x) dx
//!
//! - zpd is a Gaussian scaled to a peak of 1 (not unit area), so growth rates
//!   stay comparable across ZPD widths
//! - the integral is a composite trapezoid rule on a fixed, evenly spaced grid,
//!   fully deterministic for a given point count
//! - nodes further than `CUTOFF_SIGMAS` widths from the center are skipped;
//!   their contribution is below exp(-50)

use crate::curriculum::Intensity;
use crate::error::{Result, SimulationError};
use crate::sanitize::require_finite;
use crate::types::ZpdShape;

/// Receptivity is treated as exactly zero beyond this many widths
const CUTOFF_SIGMAS: f64 = 10.0;

/// Height-normalized Gaussian receptivity
#[inline]
pub fn receptivity(x: f64, center: f64, width: f64) -> f64 {
    let z = (x - center) / width;
    (-0.5 * z * z).exp()
}

/// Evenly spaced quadrature nodes over [lo, hi]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegrationGrid {
    lo: f64,
    hi: f64,
    points: usize,
}

impl IntegrationGrid {
    /// Needs at least two nodes and a finite, non-empty interval
    pub fn new(lo: f64, hi: f64, points: usize) -> Result<Self> {
        if points < 2 {
            return Err(SimulationError::invalid(
                "integration_points",
                format!("must be at least 2, got {points}"),
            ));
        }
        require_finite("grid.lo", lo)?;
        require_finite("grid.hi", hi)?;
        if hi <= lo {
            return Err(SimulationError::invalid(
                "grid.hi",
                format!("must exceed lo ({lo}), got {hi}"),
            ));
        }
        Ok(Self { lo, hi, points })
    }

    /// Caller guarantees `points >= 2` and `hi > lo`
    pub(crate) fn spanning(lo: f64, hi: f64, points: usize) -> Self {
        Self { lo, hi, points }
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn points(&self) -> usize {
        self.points
    }

    pub fn spacing(&self) -> f64 {
        (self.hi - self.lo) / (self.points - 1) as f64
    }

    #[inline]
    pub fn node(&self, i: usize) -> f64 {
        if i + 1 == self.points {
            self.hi
        } else {
            self.lo + i as f64 * self.spacing()
        }
    }

    pub fn nodes(&self) -> Vec<f64> {
        (0..self.points).map(|i| self.node(i)).collect()
    }

    #[inline]
    fn weight(&self, i: usize) -> f64 {
        if i == 0 || i + 1 == self.points {
            0.5 * self.spacing()
        } else {
            self.spacing()
        }
    }

    /// Index range of nodes within [lo, hi], clipped to the grid
    fn window(&self, lo: f64, hi: f64) -> std::ops::Range<usize> {
        let h = self.spacing();
        let first = ((lo - self.lo) / h).floor().max(0.0) as usize;
        let last = (((hi - self.lo) / h).ceil().max(0.0) as usize).min(self.points - 1);
        if first > last {
            0..0
        } else {
            first..last + 1
        }
    }
}

/// Single overlap evaluation at trial achievement `trial`
pub fn overlap<C: Intensity + ?Sized>(
    trial: f64,
    zpd: &ZpdShape,
    curriculum: &C,
    grid: &IntegrationGrid,
) -> f64 {
    let center = trial + zpd.offset;
    let reach = CUTOFF_SIGMAS * zpd.width;

    grid.window(center - reach, center + reach)
        .map(|i| {
            let x = grid.node(i);
            grid.weight(i) * receptivity(x, center, zpd.width) * curriculum.intensity(x)
        })
        .sum()
}

/// Overlap at every trial value, sampling the curriculum once per grid node
pub fn overlap_profile<C: Intensity + ?Sized>(
    trials: &[f64],
    zpd: &ZpdShape,
    curriculum: &C,
    grid: &IntegrationGrid,
) -> Vec<f64> {
    let weighted: Vec<f64> = (0..grid.points)
        .map(|i| grid.weight(i) * curriculum.intensity(grid.node(i)))
        .collect();
    let reach = CUTOFF_SIGMAS * zpd.width;

    trials
        .iter()
        .map(|&trial| {
            let center = trial + zpd.offset;
            grid.window(center - reach, center + reach)
                .filter(|&i| weighted[i] != 0.0)
                .map(|i| weighted[i] * receptivity(grid.node(i), center, zpd.width))
                .sum::<f64>()
        })
        .collect()
}
