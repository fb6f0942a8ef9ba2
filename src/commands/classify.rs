use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::cli::ClassifyArgs;
use crate::model::{ObservationTableFile, WaferGeometry};
use crate::observation::observations_from_records;
use crate::rules::{RuleEngine, RuleIssue, load_rules};
use crate::util::{now_utc_string, read_json, sha256_file, write_json_pretty};

#[derive(Debug, Clone, Serialize)]
pub struct InputFile {
    pub path: String,
    pub sha256: String,
}

impl InputFile {
    pub fn describe(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.display().to_string(),
            sha256: sha256_file(path)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedRow {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub code: i64,
    pub rule_id: Option<i64>,
    pub rule_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub manifest_version: u32,
    pub generated_at: String,
    pub rules: InputFile,
    pub observations: InputFile,
    pub default_return: i64,
    pub observation_count: usize,
    pub default_count: usize,
    pub code_counts: BTreeMap<i64, usize>,
    pub issues: Vec<RuleIssue>,
    pub rows: Vec<ClassifiedRow>,
}

pub fn run(args: ClassifyArgs) -> Result<()> {
    let report = build_report(&args.rules, &args.observations)?;

    let output_path = args
        .output
        .unwrap_or_else(|| args.report_dir.join("classification_report.json"));

    write_json_pretty(&output_path, &report)?;
    info!(path = %output_path.display(), "wrote classification report");
    info!(
        observations = report.observation_count,
        defaulted = report.default_count,
        codes = report.code_counts.len(),
        issues = report.issues.len(),
        "classification completed"
    );

    Ok(())
}

pub fn build_report(rules_path: &Path, observations_path: &Path) -> Result<ClassificationReport> {
    let config = load_rules(rules_path)?;
    let table: ObservationTableFile = read_json(observations_path)?;
    info!(
        rules = config.rules.len(),
        observations = table.observations.len(),
        "loaded classification inputs"
    );

    let engine = RuleEngine::compile(&config);
    let observations =
        observations_from_records(&table.observations, &WaferGeometry::default(), &[]);

    let mut code_counts = BTreeMap::new();
    let mut default_count = 0_usize;
    let mut rows = Vec::with_capacity(observations.len());

    for (index, observation) in observations.iter().enumerate() {
        let classification = engine.classify_detailed(observation);
        *code_counts.entry(classification.code).or_insert(0) += 1;
        if classification.rule_id.is_none() && classification.rule_name.is_none() {
            default_count += 1;
        }

        rows.push(ClassifiedRow {
            index,
            x: observation.position.x,
            y: observation.position.y,
            code: classification.code,
            rule_id: classification.rule_id,
            rule_name: classification.rule_name,
        });
    }

    Ok(ClassificationReport {
        manifest_version: 1,
        generated_at: now_utc_string(),
        rules: InputFile::describe(rules_path)?,
        observations: InputFile::describe(observations_path)?,
        default_return: engine.default_return(),
        observation_count: rows.len(),
        default_count,
        code_counts,
        issues: engine.issues().to_vec(),
        rows,
    })
}
