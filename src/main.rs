use std::process::ExitCode;

use serde::{Deserialize, Serialize};

use zpd_growth::logging::{init_tracing, log_level_from_env};
use zpd_growth::{
    Assignment, Cohort, Curriculum, CurriculumSet, HomeCurriculum, Simulation, SimulationConfig,
    ZpdShape,
};

/// Run inputs read from a JSON file
#[derive(Debug, Serialize, Deserialize)]
struct Scenario {
    cohort: Cohort,
    curricula: CurriculumSet,
    #[serde(default)]
    home: HomeCurriculum,
    /// 0 = no school, k = curriculum row k (1-based)
    assignment: Vec<usize>,
    /// Replaces the environment-derived configuration when present
    #[serde(default)]
    config: Option<SimulationConfig>,
}

impl Scenario {
    /// Three students around a single grade taught on days 51-150 of 200
    fn demo() -> zpd_growth::Result<Self> {
        let mut codes = vec![0; 200];
        codes[50..150].fill(1);

        Ok(Self {
            cohort: Cohort {
                achievement: vec![0.1, 0.2, 0.3],
                learning_rate: vec![0.2; 3],
                decay_rate: vec![0.0; 3],
                home_env: vec![0.0; 3],
                version: vec![0; 3],
            },
            curricula: CurriculumSet::new(vec![vec![Curriculum::new(0.2, 0.1, 100.0, 100.0)]])?,
            home: HomeCurriculum::default(),
            assignment: codes,
            config: Some(SimulationConfig {
                zpd: ZpdShape { width: 0.01, offset: 0.0 },
                dosage: 0.8,
                ..SimulationConfig::from_env()
            }),
        })
    }

    fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let scenario = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(%path, "loading scenario");
            Scenario::load(&path)?
        }
        None => {
            tracing::info!("no scenario given, running the built-in demonstration");
            Scenario::demo()?
        }
    };
    let config = scenario.config.unwrap_or_else(SimulationConfig::from_env);
    let emit_json = std::env::var("ZPD_EMIT_JSON")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let simulation = Simulation::new(
        config,
        &scenario.curricula,
        &scenario.home,
        Assignment::from_codes(&scenario.assignment),
    )?;
    let result = simulation.run(&scenario.cohort)?;

    let meta = result.metadata();
    tracing::info!(
        students = result.student_count(),
        steps = result.steps(),
        school_days = meta.assignment.school_days(),
        workers = meta.workers,
        advisories = meta.advisories.len(),
        clamped_lookups = meta.clamped_lookups,
        "run complete"
    );

    if emit_json {
        println!("{}", serde_json::to_string_pretty(&result.formatted())?);
        return Ok(());
    }

    println!("{:>8} {:>8} {:>10} {:>10} {:>10}", "student", "version", "initial", "final", "gain");
    let finals = result.final_achievement();
    let gains = result.gains();
    for s in 0..result.student_count() {
        println!(
            "{:>8} {:>8} {:>10.4} {:>10.4} {:>10.4}",
            result.student_ids()[s],
            result.versions()[s],
            result.initial()[s],
            finals[s],
            gains[s]
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing(&log_level_from_env());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
