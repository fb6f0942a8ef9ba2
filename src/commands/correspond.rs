use std::path::Path;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use super::classify::InputFile;
use crate::cli::MatchArgs;
use crate::matching::{
    MatchOutcome, MatchParams, MatchResult, MatchStats, MissType, match_observations,
};
use crate::model::{MatchConfig, ObservationRecord, ObservationTableFile, WaferGeometry};
use crate::observation::{Observation, observations_from_records};
use crate::rules::{RuleEngine, RuleIssue, load_rules};
use crate::util::{now_utc_string, read_json, write_json_pretty};

#[derive(Debug, Clone, Serialize)]
pub struct MatchInputs {
    pub candidates: InputFile,
    pub references: InputFile,
    pub config: Option<InputFile>,
    pub rules: Option<InputFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateRow {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub defect_type: Option<i64>,
    pub is_special_type: bool,
    pub is_edge_point: bool,
    pub result: MatchResult,
    pub correct_detection: bool,
    pub contaminated: bool,
    pub nearest_reference: Option<usize>,
    pub nearest_distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceRow {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub size: Option<f64>,
    pub miss_type: MissType,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub manifest_version: u32,
    pub generated_at: String,
    pub inputs: MatchInputs,
    pub config: MatchConfig,
    pub rule_issues: Vec<RuleIssue>,
    pub stats: MatchStats,
    pub warnings: Vec<String>,
    pub candidates: Vec<CandidateRow>,
    pub references: Vec<ReferenceRow>,
}

pub fn run(args: MatchArgs) -> Result<()> {
    let report = build_report(&args)?;

    if args.dry_run {
        info!(
            candidates = report.stats.candidate_count,
            references = report.stats.reference_count,
            correct = report.stats.correct,
            over_detect = report.stats.over_detect,
            "match dry-run complete"
        );
        return Ok(());
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| args.report_dir.join("match_report.json"));

    write_json_pretty(&output_path, &report)?;
    info!(path = %output_path.display(), "wrote match report");
    info!(
        correct = report.stats.correct,
        basic_miss = report.stats.basic_miss,
        classified_miss = report.stats.classified_miss,
        over_detect = report.stats.over_detect,
        clean_over_detect = report.stats.clean_over_detect,
        capture_rate = report.stats.capture_rate.unwrap_or_default(),
        warnings = report.warnings.len(),
        "match completed"
    );

    Ok(())
}

pub fn build_report(args: &MatchArgs) -> Result<MatchReport> {
    let config = resolve_config(args)?;

    let mut candidate_table: ObservationTableFile = read_json(&args.candidates)?;
    let reference_table: ObservationTableFile = read_json(&args.references)?;
    info!(
        candidates = candidate_table.observations.len(),
        references = reference_table.observations.len(),
        radius = config.radius,
        "loaded match inputs"
    );

    let rule_issues = match args.rules.as_deref() {
        Some(rules_path) => assign_defect_types(rules_path, &mut candidate_table.observations)?,
        None => Vec::new(),
    };

    let candidates = observations_from_records(
        &candidate_table.observations,
        &config.wafer,
        &config.special_type_codes,
    );
    let references =
        observations_from_records(&reference_table.observations, &config.wafer, &[]);

    let params =
        MatchParams::new(config.radius).with_contamination(config.contamination.clone());
    let outcome = match_observations(&candidates, &references, &params);

    for warning in &outcome.warnings {
        warn!(warning = %warning, "match reconciliation");
    }

    let inputs = MatchInputs {
        candidates: InputFile::describe(&args.candidates)?,
        references: InputFile::describe(&args.references)?,
        config: args.config.as_deref().map(InputFile::describe).transpose()?,
        rules: args.rules.as_deref().map(InputFile::describe).transpose()?,
    };

    Ok(MatchReport {
        manifest_version: 1,
        generated_at: now_utc_string(),
        inputs,
        candidates: candidate_rows(&candidates, &outcome),
        references: reference_rows(&references, &outcome),
        config,
        rule_issues,
        stats: outcome.stats,
        warnings: outcome.warnings,
    })
}

/// Config file values (or defaults) with command-line overrides applied.
fn resolve_config(args: &MatchArgs) -> Result<MatchConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => read_json::<MatchConfig>(path)?,
        None => MatchConfig::default(),
    };

    if let Some(radius) = args.radius {
        config.radius = radius;
    }
    if let Some(edge_radius) = args.edge_radius {
        config.wafer.edge_radius = edge_radius;
    }
    for code in &args.special_type_codes {
        if !config.special_type_codes.contains(code) {
            config.special_type_codes.push(*code);
        }
    }

    if !config.radius.is_finite() || config.radius <= 0.0 {
        bail!("match radius must be a positive number, got {}", config.radius);
    }
    if !config.wafer.edge_radius.is_finite() || config.wafer.edge_radius <= 0.0 {
        bail!(
            "wafer edge radius must be a positive number, got {}",
            config.wafer.edge_radius
        );
    }

    Ok(config)
}

fn assign_defect_types(
    rules_path: &Path,
    records: &mut [ObservationRecord],
) -> Result<Vec<RuleIssue>> {
    let rules = load_rules(rules_path)?;
    let engine = RuleEngine::compile(&rules);

    // classification reads features only, so geometry is irrelevant here
    let observations = observations_from_records(records, &WaferGeometry::default(), &[]);
    for (record, observation) in records.iter_mut().zip(&observations) {
        record.defect_type = Some(engine.classify(observation));
    }

    info!(
        path = %rules_path.display(),
        candidates = records.len(),
        issues = engine.issues().len(),
        "classified candidates before matching"
    );

    Ok(engine.issues().to_vec())
}

fn candidate_rows(candidates: &[Observation], outcome: &MatchOutcome) -> Vec<CandidateRow> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let result = outcome.candidate_results[index];
            let nearest = outcome.nearest_references[index];
            CandidateRow {
                index,
                x: candidate.position.x,
                y: candidate.position.y,
                defect_type: candidate.defect_type,
                is_special_type: candidate.is_special_type,
                is_edge_point: candidate.is_edge_point,
                result,
                correct_detection: result.is_correct_detection(),
                contaminated: outcome.contaminated[index],
                nearest_reference: nearest.map(|nearest| nearest.reference),
                nearest_distance: nearest.map(|nearest| nearest.distance),
            }
        })
        .collect()
}

fn reference_rows(references: &[Observation], outcome: &MatchOutcome) -> Vec<ReferenceRow> {
    references
        .iter()
        .zip(&outcome.reference_results)
        .enumerate()
        .map(|(index, (reference, miss_type))| ReferenceRow {
            index,
            x: reference.position.x,
            y: reference.position.y,
            size: reference.size,
            miss_type: *miss_type,
        })
        .collect()
}
