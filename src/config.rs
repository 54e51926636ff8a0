//! Simulation Configuration
//!
//! Run parameters with serde defaults and a `ZPD_*` environment overlay.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::sanitize::{require_non_negative, require_positive, require_unit_interval};
use crate::types::{
    DomainPolicy, OutputFormat, VersionPolicy, ZpdShape, DEFAULT_DOSAGE,
    DEFAULT_INTEGRATION_POINTS, DEFAULT_MAX_ACHIEVEMENT, DEFAULT_PROGRESS_EVERY,
};

/// Global multipliers applied to the three growth terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthWeights {
    pub school: f64,
    pub home: f64,
    pub decay: f64,
}

impl Default for GrowthWeights {
    fn default() -> Self {
        Self {
            school: 1.0,
            home: 1.0,
            decay: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grid nodes per lookup table and quadrature nodes per overlap integral
    pub integration_points: usize,
    pub zpd: ZpdShape,
    /// School share of growth on school days, in [0, 1]
    pub dosage: f64,
    pub weights: GrowthWeights,
    /// Upper edge of the achievement domain the tables cover
    pub max_achievement: f64,
    pub floor_at_zero: bool,
    pub cap_at_max: bool,
    pub domain_policy: DomainPolicy,
    pub version_policy: VersionPolicy,
    /// No GPU backend is compiled in; `true` only produces a warning
    pub use_gpu: bool,
    pub verbose: bool,
    /// `None` runs sequentially, `Some(n)` partitions students across n workers
    pub workers: Option<usize>,
    pub output_format: OutputFormat,
    pub progress_every: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            integration_points: DEFAULT_INTEGRATION_POINTS,
            zpd: ZpdShape::default(),
            dosage: DEFAULT_DOSAGE,
            weights: GrowthWeights::default(),
            max_achievement: DEFAULT_MAX_ACHIEVEMENT,
            floor_at_zero: true,
            cap_at_max: false,
            domain_policy: DomainPolicy::Clamp,
            version_policy: VersionPolicy::Fixed,
            use_gpu: false,
            verbose: false,
            workers: None,
            output_format: OutputFormat::Wide,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl SimulationConfig {
    /// Defaults overlaid with `ZPD_*` environment variables. Values that fail to
    /// parse leave the default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse("ZPD_INTEGRATION_POINTS") {
            config.integration_points = val;
        }
        if let Some(val) = env_parse("ZPD_WIDTH") {
            config.zpd.width = val;
        }
        if let Some(val) = env_parse("ZPD_OFFSET") {
            config.zpd.offset = val;
        }
        if let Some(val) = env_parse("ZPD_DOSAGE") {
            config.dosage = val;
        }
        if let Some(val) = env_parse("ZPD_SCHOOL_WEIGHT") {
            config.weights.school = val;
        }
        if let Some(val) = env_parse("ZPD_HOME_WEIGHT") {
            config.weights.home = val;
        }
        if let Some(val) = env_parse("ZPD_DECAY_WEIGHT") {
            config.weights.decay = val;
        }
        if let Some(val) = env_parse("ZPD_MAX_ACHIEVEMENT") {
            config.max_achievement = val;
        }
        if let Some(val) = env_parse("ZPD_CAP_AT_MAX") {
            config.cap_at_max = val;
        }
        if let Ok(val) = std::env::var("ZPD_DOMAIN_POLICY") {
            config.domain_policy = match val.to_lowercase().as_str() {
                "reject" => DomainPolicy::Reject,
                _ => DomainPolicy::Clamp,
            };
        }
        if let Ok(val) = std::env::var("ZPD_ADAPTIVE_CURRICULUM") {
            if val.parse().unwrap_or(false) {
                config.version_policy = VersionPolicy::Adaptive;
            }
        }
        if let Some(val) = env_parse("ZPD_USE_GPU") {
            config.use_gpu = val;
        }
        if let Some(val) = env_parse("ZPD_VERBOSE") {
            config.verbose = val;
        }
        if let Some(val) = env_parse::<usize>("ZPD_WORKERS") {
            config.workers = Some(val);
        }
        if let Some(format) = std::env::var("ZPD_OUTPUT_FORMAT")
            .ok()
            .and_then(|v| OutputFormat::from_str(&v))
        {
            config.output_format = format;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.integration_points < 2 {
            return Err(SimulationError::invalid(
                "integration_points",
                format!("must be at least 2, got {}", self.integration_points),
            ));
        }
        self.zpd.validate()?;
        require_unit_interval("dosage", self.dosage)?;
        require_non_negative("weights.school", self.weights.school)?;
        require_non_negative("weights.home", self.weights.home)?;
        require_non_negative("weights.decay", self.weights.decay)?;
        require_positive("max_achievement", self.max_achievement)?;
        if self.workers == Some(0) {
            return Err(SimulationError::invalid("workers", "must be at least 1"));
        }
        if self.progress_every == 0 {
            return Err(SimulationError::invalid("progress_every", "must be at least 1"));
        }
        Ok(())
    }
}
