use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub const DEFAULT_RETURN_CODE: i64 = 10002;
pub const DEFAULT_MATCH_RADIUS: f64 = 50.0;
pub const DEFAULT_EDGE_RADIUS: f64 = 147_000.0;
pub const DEFAULT_SATURATION_SENTINEL: f64 = 65_535.0;

/// Editable rule document as produced by the rule editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default = "default_return_code")]
    pub default_return: i64,
    #[serde(default)]
    pub available_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_features: Option<BTreeMap<String, ThresholdKey>>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            description: String::new(),
            thresholds: Thresholds::default(),
            default_return: DEFAULT_RETURN_CODE,
            available_features: Vec::new(),
            threshold_features: None,
            rules: Vec::new(),
        }
    }
}

fn default_return_code() -> i64 {
    DEFAULT_RETURN_CODE
}

fn default_enabled() -> bool {
    true
}

/// One element of the document's `rules` array.
///
/// An element that does not fit [`RuleSpec`] is kept verbatim with its parse
/// error, so the rest of the ruleset still loads and saving writes it back
/// unchanged.
#[derive(Debug, Clone)]
pub enum RuleEntry {
    Valid(RuleSpec),
    Malformed { raw: Value, error: String },
}

impl RuleEntry {
    pub fn spec(&self) -> Option<&RuleSpec> {
        match self {
            Self::Valid(spec) => Some(spec),
            Self::Malformed { .. } => None,
        }
    }

    /// Integer `rule_id`, read from the raw element when the rule is malformed.
    pub fn rule_id(&self) -> Option<i64> {
        match self {
            Self::Valid(spec) => spec.rule_id,
            Self::Malformed { raw, .. } => raw.get("rule_id").and_then(Value::as_i64),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Valid(spec) => &spec.name,
            Self::Malformed { raw, .. } => {
                raw.get("name").and_then(Value::as_str).unwrap_or_default()
            }
        }
    }
}

impl Serialize for RuleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid(spec) => spec.serialize(serializer),
            Self::Malformed { raw, .. } => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RuleEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let parsed = RuleSpec::deserialize(&raw);
        Ok(match parsed {
            Ok(spec) => Self::Valid(spec),
            Err(err) => Self::Malformed {
                raw,
                error: err.to_string(),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_combination: Option<String>,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub feature: String,
    pub operator: String,
    pub value: f64,
    #[serde(default)]
    pub use_threshold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub snr_adjustment: f64,
    #[serde(default)]
    pub dw1o_peak_adjustment: f64,
    #[serde(default)]
    pub dw2o_peak_adjustment: f64,
}

impl Thresholds {
    pub fn adjustment(&self, key: ThresholdKey) -> f64 {
        match key {
            ThresholdKey::SnrAdjustment => self.snr_adjustment,
            ThresholdKey::Dw1oPeakAdjustment => self.dw1o_peak_adjustment,
            ThresholdKey::Dw2oPeakAdjustment => self.dw2o_peak_adjustment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKey {
    SnrAdjustment,
    Dw1oPeakAdjustment,
    Dw2oPeakAdjustment,
}

/// One row of an observation table as written by the external loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub features: BTreeMap<String, Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_special_type: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_edge_point: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationTableFile {
    pub observations: Vec<ObservationRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaferGeometry {
    pub center_x: f64,
    pub center_y: f64,
    pub edge_radius: f64,
}

impl Default for WaferGeometry {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            edge_radius: DEFAULT_EDGE_RADIUS,
        }
    }
}

/// Saturation pattern that marks an over-detection as a sensor artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContaminationRule {
    pub features: Vec<String>,
    pub sentinel: f64,
}

impl Default for ContaminationRule {
    fn default() -> Self {
        Self {
            features: vec![
                "DW1O_MaxOrg".to_string(),
                "DW2O_MaxOrg".to_string(),
                "DN1O_MaxOrg".to_string(),
            ],
            sentinel: DEFAULT_SATURATION_SENTINEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub radius: f64,
    pub wafer: WaferGeometry,
    pub special_type_codes: Vec<i64>,
    pub contamination: ContaminationRule,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_MATCH_RADIUS,
            wafer: WaferGeometry::default(),
            special_type_codes: Vec::new(),
            contamination: ContaminationRule::default(),
        }
    }
}
