//! Serializable records handed to the web layer and the CLI.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::inference::{Fuzzification, Inputs};
use crate::membership::{DeviationTerm, LevelTerm, PowerTerm, TermDegrees};
use crate::rules::Rule;

/// Default number of fired rules kept in a [`TraceReport`].
pub const DEFAULT_TOP_RULES: usize = 10;

/// Serializes `(key, value)` pairs as a map, keeping their order.
fn ordered<S, V>(entries: &[(&'static str, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

/// Sampled universe and per-term degrees of one variable.
#[derive(Debug, Clone, Serialize)]
pub struct VariableCurves {
    pub universe: Vec<f64>,
    #[serde(serialize_with = "ordered")]
    pub terms: Vec<(&'static str, Vec<f64>)>,
}

impl VariableCurves {
    pub fn term(&self, code: &str) -> Option<&[f64]> {
        self.terms
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, degrees)| degrees.as_slice())
    }
}

/// Curves of every variable keyed by wire name.
#[derive(Debug, Clone)]
pub struct MembershipCurves {
    pub variables: Vec<(&'static str, VariableCurves)>,
}

impl Serialize for MembershipCurves {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ordered(&self.variables, serializer)
    }
}

impl MembershipCurves {
    pub fn variable(&self, name: &str) -> Option<&VariableCurves> {
        self.variables
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, curves)| curves)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleTable {
    pub total_rules: usize,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Conditions {
    #[serde(rename = "erro")]
    pub error: DeviationTerm,
    #[serde(rename = "delta_erro")]
    pub error_rate: DeviationTerm,
    #[serde(rename = "temp_externa")]
    pub external_temperature: LevelTerm,
    #[serde(rename = "carga_termica")]
    pub thermal_load: LevelTerm,
}

/// One fired rule as displayed by the dashboard. `rule_id` is the rule's
/// position in the rule base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiredRuleReport {
    pub rule_id: usize,
    pub activation: f64,
    pub conditions: Conditions,
    pub output: PowerTerm,
}

impl FiredRuleReport {
    pub fn new(rule_id: usize, rule: &Rule, activation: f64) -> Self {
        FiredRuleReport {
            rule_id,
            activation,
            conditions: Conditions {
                error: rule.error,
                error_rate: rule.error_rate,
                external_temperature: rule.external_temperature,
                thermal_load: rule.thermal_load,
            },
            output: rule.crac_power,
        }
    }
}

/// Inference details of one evaluation, truncated to the strongest rules.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub inputs: Inputs,
    pub fuzzy_values: Fuzzification,
    pub activated_rules_count: usize,
    pub activated_rules: Vec<FiredRuleReport>,
    pub output_aggregation: TermDegrees,
    pub output: f64,
    pub no_rules_fired: bool,
}
