use std::path::Path;

use anyhow::Result;

use crate::model::RulesConfig;
use crate::util::{read_json, write_json_pretty};

mod condition;
mod engine;
mod expression;

pub use condition::{ThresholdFeatureMap, evaluate_condition};
pub use engine::{RuleEngine, RuleIssue};

pub fn load_rules(path: &Path) -> Result<RulesConfig> {
    read_json(path)
}

pub fn save_rules(path: &Path, config: &RulesConfig) -> Result<()> {
    write_json_pretty(path, config)
}

/// Theoretical SNR threshold for a defect of approximate radius `radius_raw`
/// (raw sensor units). Smaller defects need a higher threshold.
pub fn theoretical_threshold_for_radius(radius_raw: f64) -> u32 {
    const STEPS: [(f64, u32); 14] = [
        (10.0, 83),
        (20.0, 41),
        (30.0, 27),
        (40.0, 20),
        (50.0, 16),
        (60.0, 13),
        (70.0, 11),
        (80.0, 10),
        (90.0, 9),
        (100.0, 8),
        (110.0, 7),
        (120.0, 6),
        (130.0, 6),
        (140.0, 5),
    ];

    STEPS
        .iter()
        .find(|(limit, _)| radius_raw <= *limit)
        .map(|(_, threshold)| *threshold)
        .unwrap_or(5)
}
