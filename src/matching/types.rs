use serde::Serialize;

use crate::model::ContaminationRule;

/// Outcome of the correspondence run for one candidate observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    OverDetect,
    SpecialTypeExcluded,
    OneToOne,
    ManyToOne,
    /// Matched alone in the reference pass, but several references lie within
    /// the radius.
    OneToMany,
    /// Shared a reference in the reference pass and sees several references.
    ManyToMany,
}

impl MatchResult {
    pub fn is_correct_detection(self) -> bool {
        matches!(
            self,
            Self::OneToOne | Self::ManyToOne | Self::OneToMany | Self::ManyToMany
        )
    }
}

/// Outcome of the correspondence run for one reference observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissType {
    Matched,
    /// No candidate of any kind within the radius.
    BasicMiss,
    /// Only special-type candidates within the radius.
    ClassifiedMiss,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchParams {
    pub radius: f64,
    pub contamination: ContaminationRule,
}

impl MatchParams {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            contamination: ContaminationRule::default(),
        }
    }

    pub fn with_contamination(mut self, contamination: ContaminationRule) -> Self {
        self.contamination = contamination;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearestReference {
    pub reference: usize,
    pub distance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchStats {
    pub candidate_count: usize,
    pub reference_count: usize,
    pub special_type_count: usize,
    /// Non-special candidates on the wafer rim.
    pub edge_count: usize,
    /// Non-special, non-edge candidates.
    pub detected_candidate_count: usize,
    pub correct: usize,
    pub basic_miss: usize,
    pub classified_miss: usize,
    /// `detected_candidate_count - correct`.
    pub over_detect: i64,
    /// Non-edge candidates tagged `OverDetect`.
    pub over_detect_tagged: usize,
    pub edge_over_detect: usize,
    pub contaminated: usize,
    pub clean_over_detect: usize,
    pub one_to_one: usize,
    pub many_to_one: usize,
    pub one_to_many: usize,
    pub many_to_many: usize,
    pub capture_rate: Option<f64>,
    pub over_detect_rate: Option<f64>,
}

/// Everything one correspondence run produces. Row `i` of each per-candidate
/// vector describes candidate `i`; likewise for references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub candidate_results: Vec<MatchResult>,
    pub reference_results: Vec<MissType>,
    pub nearest_references: Vec<Option<NearestReference>>,
    pub contaminated: Vec<bool>,
    pub stats: MatchStats,
    pub warnings: Vec<String>,
}
