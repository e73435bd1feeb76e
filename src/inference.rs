//! Mamdani min-max inference: clamp, fuzzify, fire rules, aggregate,
//! defuzzify.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::defuzzification::centroid;
use crate::error::{FuzzyError, FuzzyResult};
use crate::membership::{MembershipLibrary, Term, TermDegrees, Variable};
use crate::report::{FiredRuleReport, MembershipCurves, RuleTable, TraceReport};
use crate::rules::{Rule, RuleBase};

/// Crisp controller inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Inputs {
    #[serde(rename = "erro")]
    pub error: f64,
    #[serde(rename = "delta_erro")]
    pub error_rate: f64,
    #[serde(rename = "temp_externa")]
    pub external_temperature: f64,
    #[serde(rename = "carga_termica")]
    pub thermal_load: f64,
}

impl Inputs {
    pub fn new(error: f64, error_rate: f64, external_temperature: f64, thermal_load: f64) -> Self {
        Inputs {
            error,
            error_rate,
            external_temperature,
            thermal_load,
        }
    }

    fn get(&self, variable: Variable) -> f64 {
        match variable {
            Variable::Error => self.error,
            Variable::ErrorRate => self.error_rate,
            Variable::ExternalTemperature => self.external_temperature,
            Variable::ThermalLoad => self.thermal_load,
            Variable::CracPower => unreachable!("crac_power is not an input"),
        }
    }

    fn set(&mut self, variable: Variable, value: f64) {
        match variable {
            Variable::Error => self.error = value,
            Variable::ErrorRate => self.error_rate = value,
            Variable::ExternalTemperature => self.external_temperature = value,
            Variable::ThermalLoad => self.thermal_load = value,
            Variable::CracPower => unreachable!("crac_power is not an input"),
        }
    }
}

/// Membership degrees of every input against every one of its terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fuzzification {
    #[serde(rename = "erro")]
    pub error: TermDegrees,
    #[serde(rename = "delta_erro")]
    pub error_rate: TermDegrees,
    #[serde(rename = "temp_externa")]
    pub external_temperature: TermDegrees,
    #[serde(rename = "carga_termica")]
    pub thermal_load: TermDegrees,
}

impl Fuzzification {
    /// AND of the rule's antecedents (strict minimum).
    pub fn firing_strength(&self, rule: &Rule) -> f64 {
        self.error
            .of(rule.error)
            .min(self.error_rate.of(rule.error_rate))
            .min(self.external_temperature.of(rule.external_temperature))
            .min(self.thermal_load.of(rule.thermal_load))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredRule {
    /// Position of the rule in the rule base.
    pub rule_id: usize,
    pub rule: Rule,
    pub strength: f64,
}

/// Record of one evaluation.
#[derive(Debug, Clone)]
pub struct InferenceTrace {
    /// Inputs after clamping.
    pub inputs: Inputs,
    pub fuzzification: Fuzzification,
    /// Rules with nonzero strength, strongest first; ties keep rule order.
    pub fired: Vec<FiredRule>,
    pub aggregation: TermDegrees,
    pub output: f64,
}

impl InferenceTrace {
    /// True when the aggregated output set was empty and the output is the
    /// defuzzifier fallback.
    pub fn no_rules_fired(&self) -> bool {
        self.fired.is_empty()
    }

    pub fn report(&self, top_n: usize) -> TraceReport {
        TraceReport {
            inputs: self.inputs,
            fuzzy_values: self.fuzzification.clone(),
            activated_rules_count: self.fired.len(),
            activated_rules: self
                .fired
                .iter()
                .take(top_n)
                .map(|f| FiredRuleReport::new(f.rule_id, &f.rule, f.strength))
                .collect(),
            output_aggregation: self.aggregation.clone(),
            output: self.output,
            no_rules_fired: self.no_rules_fired(),
        }
    }
}

/// The inference engine. Immutable after construction and safe to share
/// between threads; every evaluation returns its own trace.
#[derive(Debug, Clone)]
pub struct FuzzyEngine {
    library: MembershipLibrary,
    rules: RuleBase,
}

impl FuzzyEngine {
    pub fn new() -> FuzzyResult<Self> {
        let engine = FuzzyEngine::with_rules(RuleBase::standard())?;
        info!(
            "fuzzy engine ready: {} rules, {} output terms",
            engine.rules.rule_count(),
            engine.library.output().terms().count()
        );
        Ok(engine)
    }

    /// Engine over the standard membership library and a custom rule base.
    /// Uncovered antecedent combinations are logged at `warn`.
    pub fn with_rules(rules: RuleBase) -> FuzzyResult<Self> {
        if rules.rule_count() == 0 {
            return Err(FuzzyError::EmptyRuleBase);
        }
        let library = MembershipLibrary::standard()?;
        let missing = rules.missing_combinations();
        if !missing.is_empty() {
            warn!(
                "rule base leaves {} antecedent combinations uncovered, first {:?}",
                missing.len(),
                missing[0]
            );
        }
        Ok(FuzzyEngine { library, rules })
    }

    pub fn library(&self) -> &MembershipLibrary {
        &self.library
    }

    /// Clamps every input into its universe. NaN becomes the universe
    /// midpoint.
    pub fn clamp(&self, inputs: Inputs) -> Inputs {
        let mut clamped = inputs;
        for variable in Variable::INPUTS {
            let definition = self.library.variable(variable);
            let value = inputs.get(variable);
            let value = if value.is_nan() {
                warn!("{} is NaN, using universe midpoint", variable);
                definition.midpoint()
            } else {
                definition.clamp(value)
            };
            clamped.set(variable, value);
        }
        clamped
    }

    pub fn fuzzify(&self, inputs: &Inputs) -> Fuzzification {
        let fuzzify = |variable| self.library.variable(variable).fuzzify(inputs.get(variable));
        Fuzzification {
            error: fuzzify(Variable::Error),
            error_rate: fuzzify(Variable::ErrorRate),
            external_temperature: fuzzify(Variable::ExternalTemperature),
            thermal_load: fuzzify(Variable::ThermalLoad),
        }
    }

    /// Evaluates every rule and aggregates per output term (OR = max).
    pub fn fire(&self, fuzzification: &Fuzzification) -> (Vec<FiredRule>, TermDegrees) {
        let mut aggregation = TermDegrees::zeros(self.library.output().term_codes());
        let mut fired = Vec::new();

        for (rule_id, rule) in self.rules.rules().iter().enumerate() {
            let strength = fuzzification.firing_strength(rule);
            if strength > 0.0 {
                aggregation.raise(rule.crac_power.index(), strength);
                fired.push(FiredRule {
                    rule_id,
                    rule: *rule,
                    strength,
                });
            }
        }

        fired.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        (fired, aggregation)
    }

    pub fn evaluate(&self, inputs: Inputs) -> (f64, InferenceTrace) {
        let inputs = self.clamp(inputs);
        let fuzzification = self.fuzzify(&inputs);
        let (fired, aggregation) = self.fire(&fuzzification);

        let output = self.library.output();
        let (min, max) = output.range();
        let power = centroid(&aggregation, output).clamp(min, max);

        if fired.is_empty() {
            warn!("no rule fired for {:?}, output falls back to {}", inputs, power);
        }
        debug!("{} rules fired, power {:.2}", fired.len(), power);

        let trace = InferenceTrace {
            inputs,
            fuzzification,
            fired,
            aggregation,
            output: power,
        };
        (power, trace)
    }

    pub fn calculate(
        &self,
        error: f64,
        error_rate: f64,
        external_temperature: f64,
        thermal_load: f64,
    ) -> f64 {
        self.evaluate(Inputs::new(error, error_rate, external_temperature, thermal_load))
            .0
    }

    pub fn membership(&self, variable: &str, term: &str, value: f64) -> FuzzyResult<f64> {
        self.library.membership(variable, term, value)
    }

    pub fn membership_curves(&self) -> MembershipCurves {
        self.library.curves()
    }

    pub fn rule_table(&self, limit: Option<usize>) -> RuleTable {
        self.rules.table(limit)
    }
}

/// Keeps the trace of the most recent evaluation next to a shared engine.
/// `calculate` takes `&mut self`, so concurrent callers need their own
/// controller or a lock around it.
#[derive(Debug, Clone)]
pub struct Controller {
    engine: Arc<FuzzyEngine>,
    last: Option<InferenceTrace>,
}

impl Controller {
    pub fn new(engine: Arc<FuzzyEngine>) -> Self {
        Controller { engine, last: None }
    }

    pub fn calculate(
        &mut self,
        error: f64,
        error_rate: f64,
        external_temperature: f64,
        thermal_load: f64,
    ) -> f64 {
        let (power, trace) = self.engine.evaluate(Inputs::new(
            error,
            error_rate,
            external_temperature,
            thermal_load,
        ));
        self.last = Some(trace);
        power
    }

    pub fn last_trace(&self) -> Option<&InferenceTrace> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{DeviationTerm, LevelTerm, PowerTerm};
    use approx::assert_abs_diff_eq;

    fn engine() -> FuzzyEngine {
        FuzzyEngine::new().unwrap()
    }

    #[test]
    fn critical_high_temperature_runs_at_max() {
        let power = engine().calculate(6.0, -1.0, 30.0, 70.0);
        assert!((85.0..=100.0).contains(&power), "power = {}", power);
    }

    #[test]
    fn above_setpoint_runs_high() {
        let power = engine().calculate(3.0, -0.5, 28.0, 60.0);
        assert!((65.0..=85.0).contains(&power), "power = {}", power);
    }

    #[test]
    fn setpoint_runs_moderate() {
        let (power, trace) = engine().evaluate(Inputs::new(0.0, 0.0, 25.0, 40.0));
        assert!((40.0..=60.0).contains(&power), "power = {}", power);
        assert_eq!(trace.fired.len(), 1);
        assert_eq!(trace.fired[0].rule.crac_power, PowerTerm::Medium);
        assert_abs_diff_eq!(trace.fired[0].strength, 0.5);
    }

    #[test]
    fn below_setpoint_runs_low() {
        let power = engine().calculate(-2.0, 0.5, 20.0, 30.0);
        assert!((5.0..=25.0).contains(&power), "power = {}", power);
    }

    #[test]
    fn far_below_setpoint_runs_minimal() {
        let power = engine().calculate(-6.0, 1.0, 15.0, 20.0);
        assert!((0.0..=15.0).contains(&power), "power = {}", power);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let engine = engine();
        assert_eq!(
            engine.calculate(100.0, 0.0, 35.0, 100.0),
            engine.calculate(10.0, 0.0, 35.0, 100.0)
        );
        assert_eq!(
            engine.calculate(-3.0, -40.0, -5.0, 250.0),
            engine.calculate(-3.0, -5.0, 10.0, 100.0)
        );
        let (_, trace) = engine.evaluate(Inputs::new(f64::INFINITY, 0.0, 25.0, 40.0));
        assert_eq!(trace.inputs.error, 10.0);
        assert!(!trace.no_rules_fired());
    }

    #[test]
    fn nan_input_uses_midpoint() {
        let engine = engine();
        let (power, trace) = engine.evaluate(Inputs::new(f64::NAN, 0.0, 25.0, 40.0));
        assert_eq!(trace.inputs.error, 0.0);
        assert_eq!(power, engine.calculate(0.0, 0.0, 25.0, 40.0));
    }

    #[test]
    fn uncovered_input_falls_back_to_midpoint() {
        let rules = RuleBase::from_rules(vec![Rule::new(
            DeviationTerm::ZE,
            DeviationTerm::ZE,
            LevelTerm::Medium,
            LevelTerm::Medium,
            PowerTerm::Medium,
        )])
        .unwrap();
        let engine = FuzzyEngine::with_rules(rules).unwrap();

        let (power, trace) = engine.evaluate(Inputs::new(-8.0, 3.0, 12.0, 90.0));
        assert_eq!(power, 50.0);
        assert!(trace.no_rules_fired());
        assert_eq!(trace.aggregation.max(), 0.0);
        let report = trace.report(10);
        assert!(report.no_rules_fired);
        assert_eq!(report.activated_rules_count, 0);
    }

    #[test]
    fn fired_rules_sorted_by_strength() {
        let (_, trace) = engine().evaluate(Inputs::new(1.3, -0.4, 26.5, 65.0));
        assert!(trace.fired.len() > 10);
        assert!(trace
            .fired
            .windows(2)
            .all(|w| w[0].strength >= w[1].strength));

        let report = trace.report(10);
        assert_eq!(report.activated_rules.len(), 10);
        assert_eq!(report.activated_rules_count, trace.fired.len());
        assert_eq!(report.activated_rules[0].rule_id, trace.fired[0].rule_id);
    }

    #[test]
    fn aggregation_is_max_per_term() {
        let engine = engine();
        let (_, trace) = engine.evaluate(Inputs::new(1.3, -0.4, 26.5, 65.0));
        for term in PowerTerm::ALL {
            let expected = trace
                .fired
                .iter()
                .filter(|f| f.rule.crac_power == *term)
                .map(|f| f.strength)
                .fold(0.0, f64::max);
            assert_eq!(trace.aggregation.of(*term), expected);
        }
    }

    #[test]
    fn controller_keeps_last_trace() {
        let mut controller = Controller::new(Arc::new(engine()));
        assert!(controller.last_trace().is_none());

        let first = controller.calculate(6.0, -1.0, 30.0, 70.0);
        assert_eq!(controller.last_trace().unwrap().output, first);

        let second = controller.calculate(-6.0, 1.0, 15.0, 20.0);
        let trace = controller.last_trace().unwrap();
        assert_eq!(trace.output, second);
        assert_eq!(trace.inputs.error, -6.0);
    }

    #[test]
    fn membership_by_name() {
        let engine = engine();
        assert_eq!(engine.membership("erro", "PB", 9.0).unwrap(), 1.0);
        assert_abs_diff_eq!(engine.membership("delta_erro", "NS", -1.5).unwrap(), 0.5);
        assert_abs_diff_eq!(engine.membership("crac_power", "A", 62.5).unwrap(), 0.5);
        assert_eq!(engine.membership("temp_externa", "Alta", f64::NAN).unwrap(), 0.0);
        assert_eq!(
            engine.membership("pressure", "Alta", 1.0),
            Err(FuzzyError::UnknownVariable("pressure".to_string()))
        );
        assert!(matches!(
            engine.membership("carga_termica", "MA", 50.0),
            Err(FuzzyError::UnknownTerm { .. })
        ));
    }

    #[test]
    fn report_uses_wire_names() {
        let (_, trace) = engine().evaluate(Inputs::new(0.0, 0.0, 25.0, 40.0));
        let json = serde_json::to_value(trace.report(10)).unwrap();
        assert_eq!(json["inputs"]["temp_externa"], 25.0);
        assert_eq!(json["fuzzy_values"]["erro"]["ZE"], 1.0);
        assert_eq!(json["fuzzy_values"]["carga_termica"]["Media"], 0.5);
        assert_eq!(json["activated_rules"][0]["conditions"]["carga_termica"], "Media");
        assert_eq!(json["activated_rules"][0]["output"], "M");
        assert_eq!(json["output_aggregation"]["M"], 0.5);
        assert_eq!(json["no_rules_fired"], false);
    }
}
