#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use zpd_growth::{Assignment, Cohort, Curriculum, CurriculumSet};

/// Deterministic cohort with varied rates and two curriculum versions
pub fn synthetic_cohort(n: usize, seed: u64) -> Cohort {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut cohort = Cohort::default();
    for _ in 0..n {
        cohort.achievement.push(rng.gen_range(0.0..0.4));
        cohort.learning_rate.push(rng.gen_range(0.01..0.3));
        cohort.decay_rate.push(rng.gen_range(0.0..0.002));
        cohort.home_env.push(rng.gen_range(0.0..1.0));
        cohort.version.push(rng.gen_range(0..2));
    }
    cohort
}

/// Two versions (typical, advanced) of three consecutive grades
pub fn two_version_curricula() -> CurriculumSet {
    CurriculumSet::new(vec![
        vec![
            Curriculum::new(0.1, 0.1, 30.0, 30.0),
            Curriculum::new(0.2, 0.1, 30.0, 30.0),
            Curriculum::new(0.3, 0.1, 30.0, 30.0),
        ],
        vec![
            Curriculum::new(0.15, 0.1, 30.0, 30.0),
            Curriculum::new(0.25, 0.1, 30.0, 30.0),
            Curriculum::new(0.35, 0.1, 30.0, 30.0).with_shape(2.0),
        ],
    ])
    .unwrap()
}

/// `years` school years of `days` steps each: 20 days off, the year's grade,
/// then the rest off
pub fn school_years(years: usize, days: usize) -> Assignment {
    let mut codes = Vec::with_capacity(years * days);
    for year in 0..years {
        for day in 0..days {
            let in_session = (20..days.saturating_sub(20)).contains(&day);
            codes.push(if in_session { year + 1 } else { 0 });
        }
    }
    Assignment::from_codes(&codes)
}
