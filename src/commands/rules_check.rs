use std::path::Path;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::RulesCheckArgs;
use crate::model::{ObservationTableFile, RuleEntry, RulesConfig, WaferGeometry};
use crate::observation::{Observation, observations_from_records};
use crate::rules::{RuleEngine, ThresholdFeatureMap, evaluate_condition, load_rules, save_rules};
use crate::util::read_json;

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionHits {
    pub rule_id: Option<i64>,
    pub rule_name: String,
    pub feature: String,
    pub hits: usize,
}

pub fn run(args: RulesCheckArgs) -> Result<()> {
    let config = load_rules(&args.rules)?;
    let engine = RuleEngine::compile(&config);

    info!(
        path = %args.rules.display(),
        version = %config.version,
        rules = config.rules.len(),
        enabled = config
            .rules
            .iter()
            .filter_map(RuleEntry::spec)
            .filter(|rule| rule.enabled)
            .count(),
        default_return = engine.default_return(),
        "loaded ruleset"
    );

    for issue in engine.issues() {
        warn!(issue = %issue, "ruleset issue");
    }

    if let Some(observations_path) = args.observations.as_deref() {
        let table: ObservationTableFile = read_json(observations_path)?;
        let observations =
            observations_from_records(&table.observations, &WaferGeometry::default(), &[]);

        for entry in condition_hits(&config, &observations) {
            info!(
                rule_id = entry.rule_id.unwrap_or_default(),
                rule = %entry.rule_name,
                feature = %entry.feature,
                hits = entry.hits,
                observations = observations.len(),
                "condition hit count"
            );
        }
    }

    if let Some(normalized_path) = args.normalized_output.as_deref() {
        write_normalized(normalized_path, &config)?;
        info!(path = %normalized_path.display(), "wrote normalized ruleset");
    }

    if !engine.issues().is_empty() && !args.allow_issues {
        bail!(
            "ruleset {} has {} issue(s)",
            args.rules.display(),
            engine.issues().len()
        );
    }

    info!(issues = engine.issues().len(), "rules check completed");
    Ok(())
}

/// How many observations satisfy each condition on its own, in document order.
/// Malformed rules have no conditions to count.
pub fn condition_hits(config: &RulesConfig, observations: &[Observation]) -> Vec<ConditionHits> {
    let feature_map = ThresholdFeatureMap::from_config(config);

    config
        .rules
        .iter()
        .filter_map(RuleEntry::spec)
        .flat_map(|rule| {
            rule.conditions.iter().map(|condition| ConditionHits {
                rule_id: rule.rule_id,
                rule_name: rule.name.clone(),
                feature: condition.feature.clone(),
                hits: observations
                    .iter()
                    .filter(|observation| {
                        evaluate_condition(observation, condition, &config.thresholds, &feature_map)
                    })
                    .count(),
            })
        })
        .collect()
}

fn write_normalized(path: &Path, config: &RulesConfig) -> Result<()> {
    let mut normalized = config.clone();
    normalized
        .rules
        .sort_by_key(|entry| entry.rule_id().unwrap_or(i64::MAX));
    save_rules(path, &normalized)
}
