use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use super::condition::{ChannelCombination, Operator, ThresholdFeatureMap, effective_value};
use super::expression::{Expr, ExpressionError, parse_expression};
use crate::model::{ConditionSpec, RuleEntry, RuleSpec, RulesConfig};
use crate::observation::Observation;

/// A configuration problem found while compiling a ruleset. The offending rule
/// or condition still compiles, it just never holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleIssue {
    pub rule_id: Option<i64>,
    pub rule_name: String,
    pub message: String,
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule_id {
            Some(rule_id) => write!(f, "rule {rule_id} ({}): {}", self.rule_name, self.message),
            None => write!(f, "rule without id ({}): {}", self.rule_name, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub code: i64,
    pub rule_id: Option<i64>,
    pub rule_name: Option<String>,
}

#[derive(Debug, Clone)]
enum Combinator {
    All,
    Any,
    Expression(Expr<usize>),
    Never,
}

#[derive(Debug, Clone)]
struct CompiledCondition {
    feature: String,
    operator: Option<Operator>,
    threshold: f64,
}

impl CompiledCondition {
    fn holds(&self, observation: &Observation) -> bool {
        self.operator
            .map(|operator| operator.apply(observation.feature(&self.feature), self.threshold))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule_id: Option<i64>,
    name: String,
    enabled: bool,
    channel: ChannelCombination,
    conditions: Vec<CompiledCondition>,
    combinator: Combinator,
    return_value: i64,
}

impl CompiledRule {
    fn fires(&self, observation: &Observation) -> bool {
        if !self.enabled || self.conditions.is_empty() || !self.channel.admits(observation) {
            return false;
        }

        match &self.combinator {
            Combinator::All => self.conditions.iter().all(|c| c.holds(observation)),
            Combinator::Any => self.conditions.iter().any(|c| c.holds(observation)),
            Combinator::Expression(expr) => {
                let values = self
                    .conditions
                    .iter()
                    .map(|c| c.holds(observation))
                    .collect::<Vec<bool>>();
                expr.eval(&values)
            }
            Combinator::Never => false,
        }
    }
}

/// Ruleset compiled for row-at-a-time classification.
///
/// Rules are ordered by `rule_id` (stable, missing ids last); the first enabled
/// rule that fires decides the code.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
    default_return: i64,
    issues: Vec<RuleIssue>,
}

impl RuleEngine {
    pub fn compile(config: &RulesConfig) -> Self {
        let feature_map = ThresholdFeatureMap::from_config(config);

        let mut ordered = config.rules.iter().collect::<Vec<&RuleEntry>>();
        ordered.sort_by_key(|entry| entry.rule_id().unwrap_or(i64::MAX));

        let mut issues = Vec::new();
        let rules = ordered
            .into_iter()
            .map(|entry| match entry {
                RuleEntry::Valid(rule) => compile_rule(rule, config, &feature_map, &mut issues),
                RuleEntry::Malformed { error, .. } => {
                    record_issue(
                        &mut issues,
                        entry.rule_id(),
                        entry.name(),
                        format!("malformed rule skipped: {error}"),
                    );
                    CompiledRule {
                        rule_id: entry.rule_id(),
                        name: entry.name().to_string(),
                        enabled: false,
                        channel: ChannelCombination::Unrestricted,
                        conditions: Vec::new(),
                        combinator: Combinator::Never,
                        return_value: config.default_return,
                    }
                }
            })
            .collect::<Vec<CompiledRule>>();

        debug!(
            rules = rules.len(),
            issues = issues.len(),
            default_return = config.default_return,
            "compiled ruleset"
        );

        Self {
            rules,
            default_return: config.default_return,
            issues,
        }
    }

    pub fn issues(&self) -> &[RuleIssue] {
        &self.issues
    }

    pub fn default_return(&self) -> i64 {
        self.default_return
    }

    pub fn classify(&self, observation: &Observation) -> i64 {
        self.classify_detailed(observation).code
    }

    pub fn classify_detailed(&self, observation: &Observation) -> Classification {
        self.rules
            .iter()
            .find(|rule| rule.fires(observation))
            .map(|rule| Classification {
                code: rule.return_value,
                rule_id: rule.rule_id,
                rule_name: Some(rule.name.clone()),
            })
            .unwrap_or(Classification {
                code: self.default_return,
                rule_id: None,
                rule_name: None,
            })
    }
}

fn compile_rule(
    rule: &RuleSpec,
    config: &RulesConfig,
    feature_map: &ThresholdFeatureMap,
    issues: &mut Vec<RuleIssue>,
) -> CompiledRule {
    let mut report =
        |message: String| record_issue(issues, rule.rule_id, &rule.name, message);

    let channel = match rule.channel_combination.as_deref() {
        None => ChannelCombination::Unrestricted,
        Some(raw) => ChannelCombination::parse(raw).unwrap_or_else(|| {
            report(format!("unknown channel combination '{raw}'; treated as unrestricted"));
            ChannelCombination::Unrestricted
        }),
    };

    let conditions = rule
        .conditions
        .iter()
        .map(|condition| {
            let operator = Operator::parse(&condition.operator);
            if operator.is_none() {
                report(format!(
                    "unsupported operator '{}' on feature {}; condition never holds",
                    condition.operator, condition.feature
                ));
            }
            CompiledCondition {
                feature: condition.feature.clone(),
                operator,
                threshold: effective_value(condition, &config.thresholds, feature_map),
            }
        })
        .collect::<Vec<CompiledCondition>>();

    // an empty string means "no expression"; whitespace alone is a bad expression
    let expression = rule
        .logic_expression
        .as_deref()
        .filter(|expression| !expression.is_empty());

    let combinator = match expression {
        Some(expression) => match compile_expression(expression, &rule.conditions) {
            Ok(expr) => Combinator::Expression(expr),
            Err(err) => {
                report(format!("logic expression '{expression}' rejected: {err}"));
                Combinator::Never
            }
        },
        None => match rule.logic.as_deref().unwrap_or("AND") {
            "AND" => Combinator::All,
            "OR" => Combinator::Any,
            other => {
                report(format!("unknown logic '{other}'; rule never fires"));
                Combinator::Never
            }
        },
    };

    CompiledRule {
        rule_id: rule.rule_id,
        name: rule.name.clone(),
        enabled: rule.enabled,
        channel,
        conditions,
        combinator,
        return_value: rule.return_value.unwrap_or(config.default_return),
    }
}

fn record_issue(
    issues: &mut Vec<RuleIssue>,
    rule_id: Option<i64>,
    rule_name: &str,
    message: String,
) {
    warn!(
        rule_id = rule_id.unwrap_or_default(),
        rule = %rule_name,
        issue = %message,
        "rule configuration issue"
    );
    issues.push(RuleIssue {
        rule_id,
        rule_name: rule_name.to_string(),
        message,
    });
}

/// Slots are condition positions; identifiers are `condition_id` or the
/// 1-based position when no id is given.
fn compile_expression(
    expression: &str,
    conditions: &[ConditionSpec],
) -> Result<Expr<usize>, ExpressionError> {
    let mut slots = HashMap::<String, usize>::with_capacity(conditions.len());
    for (slot, condition) in conditions.iter().enumerate() {
        let identifier = condition
            .condition_id
            .unwrap_or(slot as i64 + 1)
            .to_string();
        if slots.insert(identifier.clone(), slot).is_some() {
            return Err(ExpressionError::DuplicateIdentifier(identifier));
        }
    }

    parse_expression(expression)?.resolve(&slots)
}
