//! Declarative IF-THEN rule table.
//!
//! The standard base enumerates every antecedent combination
//! (7 × 7 × 3 × 3 = 441 rules). Consequents follow the control design:
//! large error magnitudes dominate, moderate or zero error is modulated by
//! external temperature and thermal load, and a negative error rate
//! (error growing) pushes towards stronger action.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{FuzzyError, FuzzyResult};
use crate::membership::{DeviationTerm, LevelTerm, PowerTerm, Term};
use crate::report::RuleTable;

/// Number of rules returned by [`RuleBase::table`] when no limit is given.
pub const DEFAULT_TABLE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rule {
    #[serde(rename = "erro")]
    pub error: DeviationTerm,
    #[serde(rename = "delta_erro")]
    pub error_rate: DeviationTerm,
    #[serde(rename = "temp_externa")]
    pub external_temperature: LevelTerm,
    #[serde(rename = "carga_termica")]
    pub thermal_load: LevelTerm,
    #[serde(rename = "potencia_crac")]
    pub crac_power: PowerTerm,
}

/// The four input terms of a rule.
pub type Antecedent = (DeviationTerm, DeviationTerm, LevelTerm, LevelTerm);

impl Rule {
    pub fn new(
        error: DeviationTerm,
        error_rate: DeviationTerm,
        external_temperature: LevelTerm,
        thermal_load: LevelTerm,
        crac_power: PowerTerm,
    ) -> Self {
        Rule {
            error,
            error_rate,
            external_temperature,
            thermal_load,
            crac_power,
        }
    }

    pub fn antecedent(&self) -> Antecedent {
        (
            self.error,
            self.error_rate,
            self.external_temperature,
            self.thermal_load,
        )
    }
}

/// Output term assigned to one antecedent combination of the standard base.
pub fn consequent(
    error: DeviationTerm,
    error_rate: DeviationTerm,
    external_temperature: LevelTerm,
    thermal_load: LevelTerm,
) -> PowerTerm {
    use crate::membership::DeviationTerm::*;
    use crate::membership::LevelTerm::{High, Low, Medium};

    let worsening = matches!(error_rate, NB | NM | NS);
    let improving = matches!(error_rate, PS | PM | PB);
    let conditions = (external_temperature, thermal_load);

    match error {
        PB => PowerTerm::VeryHigh,
        PM => {
            if conditions == (High, High) && !matches!(error_rate, PM | PB) {
                PowerTerm::VeryHigh
            } else {
                PowerTerm::High
            }
        }
        PS if worsening => match conditions {
            (Low, Low) | (Medium, Low) => PowerTerm::Medium,
            (High, High) => PowerTerm::VeryHigh,
            _ => PowerTerm::High,
        },
        PS => match conditions {
            (Low, Low) => PowerTerm::Low,
            (Medium, High) | (High, Medium) | (High, High) => PowerTerm::High,
            _ => PowerTerm::Medium,
        },
        ZE if worsening => {
            if conditions == (Low, Low) {
                PowerTerm::Medium
            } else {
                PowerTerm::High
            }
        }
        ZE if improving => {
            if conditions == (Low, Low) {
                PowerTerm::VeryLow
            } else {
                PowerTerm::Low
            }
        }
        ZE => match conditions {
            (Low, Low) | (Low, Medium) => PowerTerm::Low,
            (Medium, High) | (High, Medium) | (High, High) => PowerTerm::High,
            _ => PowerTerm::Medium,
        },
        NS if improving => PowerTerm::VeryLow,
        NS => {
            if conditions == (High, High) {
                PowerTerm::Medium
            } else if thermal_load == Low {
                PowerTerm::VeryLow
            } else {
                PowerTerm::Low
            }
        }
        NM | NB => PowerTerm::VeryLow,
    }
}

fn all_antecedents() -> impl Iterator<Item = Antecedent> {
    DeviationTerm::ALL.iter().flat_map(|&error| {
        DeviationTerm::ALL.iter().flat_map(move |&rate| {
            LevelTerm::ALL.iter().flat_map(move |&ext| {
                LevelTerm::ALL
                    .iter()
                    .map(move |&load| (error, rate, ext, load))
            })
        })
    })
}

/// Ordered, immutable collection of rules.
#[derive(Debug, Clone)]
pub struct RuleBase {
    rules: Vec<Rule>,
}

impl RuleBase {
    /// Full Cartesian rule base, error term outermost.
    pub fn standard() -> Self {
        let rules = all_antecedents()
            .map(|(error, rate, ext, load)| {
                Rule::new(error, rate, ext, load, consequent(error, rate, ext, load))
            })
            .collect();
        RuleBase { rules }
    }

    /// A custom rule base, kept in the given order. It may leave antecedent
    /// combinations uncovered; see [`RuleBase::missing_combinations`].
    pub fn from_rules(rules: Vec<Rule>) -> FuzzyResult<Self> {
        if rules.is_empty() {
            return Err(FuzzyError::EmptyRuleBase);
        }
        Ok(RuleBase { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn prefix(&self, limit: usize) -> &[Rule] {
        &self.rules[..limit.min(self.rules.len())]
    }

    /// Antecedent combinations no rule covers. Any of them is an input region
    /// where nothing fires.
    pub fn missing_combinations(&self) -> Vec<Antecedent> {
        let covered: HashSet<Antecedent> = self.rules.iter().map(Rule::antecedent).collect();
        all_antecedents()
            .filter(|antecedent| !covered.contains(antecedent))
            .collect()
    }

    pub fn table(&self, limit: Option<usize>) -> RuleTable {
        RuleTable {
            total_rules: self.rule_count(),
            rules: self.prefix(limit.unwrap_or(DEFAULT_TABLE_LIMIT)).to_vec(),
        }
    }
}
