use std::collections::HashMap;

use crate::model::{ConditionSpec, RulesConfig, ThresholdKey, Thresholds};
use crate::observation::Observation;

pub const D_CHANNEL_FEATURE: &str = "DW1O_TotalSNR";
pub const J_CHANNEL_FEATURE: &str = "DW2O_TotalSNR";
pub const P_CHANNEL_FEATURE: &str = "DN1O_TotalSNR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Operator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => left == right,
            Self::Ne => left != right,
        }
    }
}

/// Explicit feature-name to threshold-adjustment table.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdFeatureMap {
    entries: HashMap<String, ThresholdKey>,
}

impl Default for ThresholdFeatureMap {
    fn default() -> Self {
        let entries = [
            ("DW1O_TotalSNR", ThresholdKey::SnrAdjustment),
            ("DW1O_MainRowSNR", ThresholdKey::SnrAdjustment),
            ("DW2O_TotalSNR", ThresholdKey::SnrAdjustment),
            ("DW2O_MainRowSNR", ThresholdKey::SnrAdjustment),
            ("DN1O_TotalSNR", ThresholdKey::SnrAdjustment),
            ("DW1O_MaxOrg", ThresholdKey::Dw1oPeakAdjustment),
            ("DW1O_Peak", ThresholdKey::Dw1oPeakAdjustment),
            ("DW2O_MaxOrg", ThresholdKey::Dw2oPeakAdjustment),
            ("DW2O_Peak", ThresholdKey::Dw2oPeakAdjustment),
        ];
        Self::from_entries(
            entries
                .into_iter()
                .map(|(feature, key)| (feature.to_string(), key)),
        )
    }
}

impl ThresholdFeatureMap {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, ThresholdKey)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// The document's own table when it has one, the built-in table otherwise.
    pub fn from_config(config: &RulesConfig) -> Self {
        config
            .threshold_features
            .as_ref()
            .map(|entries| {
                Self::from_entries(entries.iter().map(|(feature, key)| (feature.clone(), *key)))
            })
            .unwrap_or_default()
    }

    pub fn key_for(&self, feature: &str) -> Option<ThresholdKey> {
        self.entries.get(feature).copied()
    }
}

/// Channel-presence gate of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCombination {
    DOnly,
    JOnly,
    POnly,
    DAndJ,
    DAndP,
    JAndP,
    DAndJAndP,
    Unrestricted,
}

impl ChannelCombination {
    /// `None` for a name that is not one of the known combinations.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "D_only" => Some(Self::DOnly),
            "J_only" => Some(Self::JOnly),
            "P_only" => Some(Self::POnly),
            "D_and_J" => Some(Self::DAndJ),
            "D_and_P" => Some(Self::DAndP),
            "J_and_P" => Some(Self::JAndP),
            "D_and_J_and_P" => Some(Self::DAndJAndP),
            "" => Some(Self::Unrestricted),
            _ => None,
        }
    }

    pub fn admits(self, observation: &Observation) -> bool {
        let signature = (
            observation.feature(D_CHANNEL_FEATURE) > 0.0,
            observation.feature(J_CHANNEL_FEATURE) > 0.0,
            observation.feature(P_CHANNEL_FEATURE) > 0.0,
        );

        match self {
            Self::DOnly => signature == (true, false, false),
            Self::JOnly => signature == (false, true, false),
            Self::POnly => signature == (false, false, true),
            Self::DAndJ => signature == (true, true, false),
            Self::DAndP => signature == (true, false, true),
            Self::JAndP => signature == (false, true, true),
            Self::DAndJAndP => signature == (true, true, true),
            Self::Unrestricted => true,
        }
    }
}

/// Comparison value of `condition` after any threshold adjustment.
pub fn effective_value(
    condition: &ConditionSpec,
    thresholds: &Thresholds,
    feature_map: &ThresholdFeatureMap,
) -> f64 {
    if !condition.use_threshold {
        return condition.value;
    }

    feature_map
        .key_for(&condition.feature)
        .map(|key| condition.value + thresholds.adjustment(key))
        .unwrap_or(condition.value)
}

/// Evaluate one condition against one observation. Unsupported operators are
/// `false`.
pub fn evaluate_condition(
    observation: &Observation,
    condition: &ConditionSpec,
    thresholds: &Thresholds,
    feature_map: &ThresholdFeatureMap,
) -> bool {
    let Some(operator) = Operator::parse(&condition.operator) else {
        return false;
    };

    let feature_value = observation.feature(&condition.feature);
    operator.apply(
        feature_value,
        effective_value(condition, thresholds, feature_map),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(feature: &str, operator: &str, value: f64, use_threshold: bool) -> ConditionSpec {
        ConditionSpec {
            feature: feature.to_string(),
            operator: operator.to_string(),
            value,
            use_threshold,
            condition_id: None,
        }
    }

    fn snr_thresholds(adjustment: f64) -> Thresholds {
        Thresholds {
            snr_adjustment: adjustment,
            ..Thresholds::default()
        }
    }

    #[test]
    fn threshold_adjustment_is_added_before_comparison() {
        let map = ThresholdFeatureMap::default();
        let rule = condition("DW1O_TotalSNR", ">", 10.0, true);
        let thresholds = snr_thresholds(5.0);

        let weak = Observation::at(0.0, 0.0).with_feature("DW1O_TotalSNR", 14.0);
        let strong = Observation::at(0.0, 0.0).with_feature("DW1O_TotalSNR", 16.0);

        assert!(!evaluate_condition(&weak, &rule, &thresholds, &map));
        assert!(evaluate_condition(&strong, &rule, &thresholds, &map));
    }

    #[test]
    fn shifting_the_adjustment_moves_the_outcome() {
        let map = ThresholdFeatureMap::default();
        let rule = condition("DN1O_TotalSNR", ">=", 8.0, true);
        let observation = Observation::at(0.0, 0.0).with_feature("DN1O_TotalSNR", 10.0);

        assert!(evaluate_condition(&observation, &rule, &snr_thresholds(2.0), &map));
        assert!(!evaluate_condition(&observation, &rule, &snr_thresholds(2.5), &map));
        assert!(evaluate_condition(&observation, &rule, &snr_thresholds(-3.0), &map));
    }

    #[test]
    fn peak_features_use_their_own_adjustment() {
        let map = ThresholdFeatureMap::default();
        let thresholds = Thresholds {
            snr_adjustment: 100.0,
            dw1o_peak_adjustment: 1.0,
            dw2o_peak_adjustment: 50.0,
        };
        let rule = condition("DW1O_Peak", "<", 10.0, true);

        assert_eq!(effective_value(&rule, &thresholds, &map), 11.0);
        assert_eq!(
            effective_value(&condition("DW2O_MaxOrg", "<", 10.0, true), &thresholds, &map),
            60.0
        );
    }

    #[test]
    fn unmapped_or_unflagged_features_keep_literal_value() {
        let map = ThresholdFeatureMap::default();
        let thresholds = snr_thresholds(5.0);

        assert_eq!(
            effective_value(&condition("Area", ">", 3.0, true), &thresholds, &map),
            3.0
        );
        assert_eq!(
            effective_value(&condition("DW1O_TotalSNR", ">", 3.0, false), &thresholds, &map),
            3.0
        );
        // exact names only; fragments do not map
        assert_eq!(
            effective_value(&condition("DW1O_TotalSNR_Norm", ">", 3.0, true), &thresholds, &map),
            3.0
        );
    }

    #[test]
    fn missing_feature_compares_as_zero_and_bad_operator_is_false() {
        let map = ThresholdFeatureMap::default();
        let thresholds = Thresholds::default();
        let observation = Observation::at(0.0, 0.0);

        let holds = |operator: &str| {
            evaluate_condition(
                &observation,
                &condition("Area", operator, 0.0, false),
                &thresholds,
                &map,
            )
        };

        assert!(holds("=="));
        assert!(!holds("=>"));
        assert!(!holds(""));
        // operators are matched exactly
        assert!(!holds(" =="));
    }

    #[test]
    fn null_feature_only_satisfies_not_equal() {
        let map = ThresholdFeatureMap::default();
        let thresholds = Thresholds::default();
        let mut observation = Observation::at(0.0, 0.0);
        observation.features.insert("Area".to_string(), None);

        let holds = |operator: &str| {
            evaluate_condition(
                &observation,
                &condition("Area", operator, 0.0, false),
                &thresholds,
                &map,
            )
        };

        assert!(!holds(">="));
        assert!(!holds("=="));
        assert!(holds("!="));
    }

    #[test]
    fn channel_combinations_require_exact_signature() {
        let d_only = Observation::at(0.0, 0.0).with_feature(D_CHANNEL_FEATURE, 3.0);
        let d_and_p = d_only.clone().with_feature(P_CHANNEL_FEATURE, 1.0);
        let all = d_and_p.clone().with_feature(J_CHANNEL_FEATURE, 2.0);

        assert!(ChannelCombination::DOnly.admits(&d_only));
        assert!(!ChannelCombination::DOnly.admits(&d_and_p));
        assert!(ChannelCombination::DAndP.admits(&d_and_p));
        assert!(!ChannelCombination::DAndJAndP.admits(&d_and_p));
        assert!(ChannelCombination::DAndJAndP.admits(&all));
        assert!(ChannelCombination::Unrestricted.admits(&Observation::at(0.0, 0.0)));
    }

    #[test]
    fn channel_combination_names_parse() {
        assert_eq!(ChannelCombination::parse("J_and_P"), Some(ChannelCombination::JAndP));
        assert_eq!(ChannelCombination::parse(""), Some(ChannelCombination::Unrestricted));
        assert_eq!(ChannelCombination::parse("X_only"), None);
        assert_eq!(ChannelCombination::parse(" D_only"), None);
    }
}
