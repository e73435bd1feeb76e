//! Linguistic variables, their terms and the piecewise-linear membership
//! shapes attached to each term.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{FuzzyError, FuzzyResult};
use crate::report::{MembershipCurves, VariableCurves};

/// Number of evenly spaced samples taken over every universe of discourse.
pub const RESOLUTION: usize = 200;

/// The five linguistic dimensions of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Variable {
    #[serde(rename = "erro")]
    Error,
    #[serde(rename = "delta_erro")]
    ErrorRate,
    #[serde(rename = "temp_externa")]
    ExternalTemperature,
    #[serde(rename = "carga_termica")]
    ThermalLoad,
    #[serde(rename = "potencia_crac")]
    CracPower,
}

impl Variable {
    pub const ALL: [Variable; 5] = [
        Variable::Error,
        Variable::ErrorRate,
        Variable::ExternalTemperature,
        Variable::ThermalLoad,
        Variable::CracPower,
    ];

    pub const INPUTS: [Variable; 4] = [
        Variable::Error,
        Variable::ErrorRate,
        Variable::ExternalTemperature,
        Variable::ThermalLoad,
    ];

    /// Wire name used by the dashboard.
    pub fn name(self) -> &'static str {
        match self {
            Variable::Error => "erro",
            Variable::ErrorRate => "delta_erro",
            Variable::ExternalTemperature => "temp_externa",
            Variable::ThermalLoad => "carga_termica",
            Variable::CracPower => "potencia_crac",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = FuzzyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "erro" | "error" => Ok(Variable::Error),
            "delta_erro" | "error_rate" => Ok(Variable::ErrorRate),
            "temp_externa" | "external_temperature" => Ok(Variable::ExternalTemperature),
            "carga_termica" | "thermal_load" => Ok(Variable::ThermalLoad),
            "potencia_crac" | "crac_power" => Ok(Variable::CracPower),
            _ => Err(FuzzyError::UnknownVariable(s.to_string())),
        }
    }
}

/// Common behaviour of the typed term enums. `index()` is the position of
/// the term inside its variable's ordered term list.
pub trait Term: Copy + Eq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn code(self) -> &'static str;

    fn index(self) -> usize;

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }
}

/// Signed magnitude terms shared by the error and error-rate variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviationTerm {
    NB,
    NM,
    NS,
    ZE,
    PS,
    PM,
    PB,
}

impl Term for DeviationTerm {
    const ALL: &'static [Self] = &[
        DeviationTerm::NB,
        DeviationTerm::NM,
        DeviationTerm::NS,
        DeviationTerm::ZE,
        DeviationTerm::PS,
        DeviationTerm::PM,
        DeviationTerm::PB,
    ];

    fn code(self) -> &'static str {
        match self {
            DeviationTerm::NB => "NB",
            DeviationTerm::NM => "NM",
            DeviationTerm::NS => "NS",
            DeviationTerm::ZE => "ZE",
            DeviationTerm::PS => "PS",
            DeviationTerm::PM => "PM",
            DeviationTerm::PB => "PB",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Low / medium / high terms of external temperature and thermal load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LevelTerm {
    #[serde(rename = "Baixa")]
    Low,
    #[serde(rename = "Media")]
    Medium,
    #[serde(rename = "Alta")]
    High,
}

impl Term for LevelTerm {
    const ALL: &'static [Self] = &[LevelTerm::Low, LevelTerm::Medium, LevelTerm::High];

    fn code(self) -> &'static str {
        match self {
            LevelTerm::Low => "Baixa",
            LevelTerm::Medium => "Media",
            LevelTerm::High => "Alta",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Output terms of the cooling-unit power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PowerTerm {
    #[serde(rename = "MB")]
    VeryLow,
    #[serde(rename = "B")]
    Low,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "A")]
    High,
    #[serde(rename = "MA")]
    VeryHigh,
}

impl Term for PowerTerm {
    const ALL: &'static [Self] = &[
        PowerTerm::VeryLow,
        PowerTerm::Low,
        PowerTerm::Medium,
        PowerTerm::High,
        PowerTerm::VeryHigh,
    ];

    fn code(self) -> &'static str {
        match self {
            PowerTerm::VeryLow => "MB",
            PowerTerm::Low => "B",
            PowerTerm::Medium => "M",
            PowerTerm::High => "A",
            PowerTerm::VeryHigh => "MA",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Piecewise-linear membership shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Triangular { a: f64, b: f64, c: f64 },
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
}

impl Shape {
    pub fn triangular(a: f64, b: f64, c: f64) -> FuzzyResult<Shape> {
        check_points(&[a, b, c])?;
        Ok(Shape::Triangular { a, b, c })
    }

    pub fn trapezoidal(a: f64, b: f64, c: f64, d: f64) -> FuzzyResult<Shape> {
        check_points(&[a, b, c, d])?;
        Ok(Shape::Trapezoidal { a, b, c, d })
    }

    /// Degree of membership of `x`, in [0, 1].
    ///
    /// Shoulders are closed on the plateau side and open on the outer side.
    /// A zero-width shoulder is a vertical step: the branch that would divide
    /// by its width is unreachable because its interval is empty. NaN belongs
    /// to no term.
    pub fn degree(&self, x: f64) -> f64 {
        if x.is_nan() {
            return 0.0;
        }
        match *self {
            Shape::Triangular { a, b, c } => {
                if x <= a || x >= c {
                    0.0
                } else if x <= b {
                    (x - a) / (b - a)
                } else {
                    (c - x) / (c - b)
                }
            }
            Shape::Trapezoidal { a, b, c, d } => {
                if x < a || x > d {
                    0.0
                } else if x < b {
                    (x - a) / (b - a)
                } else if x <= c {
                    1.0
                } else {
                    (d - x) / (d - c)
                }
            }
        }
    }

}

fn check_points(points: &[f64]) -> FuzzyResult<()> {
    let malformed = |reason: &str| FuzzyError::MalformedShape {
        points: points.to_vec(),
        reason: reason.to_string(),
    };
    if points.iter().any(|p| !p.is_finite()) {
        return Err(malformed("points must be finite"));
    }
    if points.windows(2).any(|w| w[0] > w[1]) {
        return Err(malformed("points must be non-decreasing"));
    }
    if points[0] == points[points.len() - 1] {
        return Err(malformed("support has zero width"));
    }
    Ok(())
}

/// Membership degrees of one crisp value against every term of a variable,
/// in term order.
#[derive(Debug, Clone, PartialEq)]
pub struct TermDegrees {
    entries: Vec<(&'static str, f64)>,
}

impl TermDegrees {
    pub fn new(entries: Vec<(&'static str, f64)>) -> Self {
        TermDegrees { entries }
    }

    /// All-zero degrees for the given term codes.
    pub fn zeros(codes: impl IntoIterator<Item = &'static str>) -> Self {
        TermDegrees {
            entries: codes.into_iter().map(|code| (code, 0.0)).collect(),
        }
    }

    pub fn at(&self, index: usize) -> f64 {
        self.entries[index].1
    }

    pub fn of<T: Term>(&self, term: T) -> f64 {
        self.at(term.index())
    }

    /// Raises the degree at `index` to `value` if it is larger (fuzzy OR).
    pub fn raise(&mut self, index: usize, value: f64) {
        let slot = &mut self.entries[index].1;
        *slot = slot.max(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max(&self) -> f64 {
        self.entries.iter().fold(0.0, |acc, (_, d)| acc.max(*d))
    }
}

impl Serialize for TermDegrees {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (code, degree) in &self.entries {
            map.serialize_entry(code, degree)?;
        }
        map.end()
    }
}

/// A variable with its universe of discourse and ordered term shapes.
#[derive(Debug, Clone)]
pub struct LinguisticVariable {
    variable: Variable,
    min: f64,
    max: f64,
    resolution: usize,
    terms: Vec<(&'static str, Shape)>,
}

impl LinguisticVariable {
    /// Builds a variable from typed terms. Every term of `T` must be given a
    /// shape exactly once; the order of `shapes` is irrelevant.
    pub fn new<T: Term>(
        variable: Variable,
        min: f64,
        max: f64,
        shapes: &[(T, Shape)],
    ) -> FuzzyResult<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(FuzzyError::MalformedShape {
                points: vec![min, max],
                reason: format!("invalid universe for {}", variable),
            });
        }
        let mut terms = Vec::with_capacity(T::ALL.len());
        for term in T::ALL {
            let shape = shapes
                .iter()
                .find(|(t, _)| t == term)
                .map(|(_, s)| *s)
                .ok_or_else(|| FuzzyError::MissingTerm {
                    variable: variable.name().to_string(),
                    term: term.code().to_string(),
                })?;
            terms.push((term.code(), shape));
        }
        Ok(LinguisticVariable {
            variable,
            min,
            max,
            resolution: RESOLUTION,
            terms,
        })
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn terms(&self) -> impl Iterator<Item = (&'static str, &Shape)> + '_ {
        self.terms.iter().map(|(code, shape)| (*code, shape))
    }

    pub fn term_codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.terms.iter().map(|(code, _)| *code)
    }

    pub fn shape(&self, code: &str) -> FuzzyResult<&Shape> {
        self.terms
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, s)| s)
            .ok_or_else(|| FuzzyError::UnknownTerm {
                variable: self.variable.name().to_string(),
                term: code.to_string(),
            })
    }

    pub fn shape_at(&self, index: usize) -> &Shape {
        &self.terms[index].1
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }

    /// Evenly spaced samples over the universe, both bounds included.
    pub fn universe(&self) -> Vec<f64> {
        let n = self.resolution;
        let step = (self.max - self.min) / (n - 1) as f64;
        (0..n)
            .map(|i| if i == n - 1 { self.max } else { self.min + step * i as f64 })
            .collect()
    }

    pub fn fuzzify(&self, x: f64) -> TermDegrees {
        TermDegrees::new(
            self.terms
                .iter()
                .map(|(code, shape)| (*code, shape.degree(x)))
                .collect(),
        )
    }

    fn curves(&self) -> VariableCurves {
        let universe = self.universe();
        let terms = self
            .terms
            .iter()
            .map(|(code, shape)| (*code, universe.iter().map(|x| shape.degree(*x)).collect()))
            .collect();
        VariableCurves { universe, terms }
    }
}

/// The five linguistic variables of the controller. Immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct MembershipLibrary {
    variables: Vec<LinguisticVariable>,
}

impl MembershipLibrary {
    pub fn standard() -> FuzzyResult<Self> {
        use DeviationTerm::*;
        use LevelTerm::{High, Low, Medium};

        let error = LinguisticVariable::new(
            Variable::Error,
            -10.0,
            10.0,
            &[
                (NB, Shape::trapezoidal(-10.0, -10.0, -8.0, -4.0)?),
                (NM, Shape::triangular(-8.0, -4.0, -2.0)?),
                (NS, Shape::triangular(-4.0, -2.0, 0.0)?),
                (ZE, Shape::triangular(-2.0, 0.0, 2.0)?),
                (PS, Shape::triangular(0.0, 2.0, 4.0)?),
                (PM, Shape::triangular(2.0, 4.0, 8.0)?),
                (PB, Shape::trapezoidal(4.0, 8.0, 10.0, 10.0)?),
            ],
        )?;

        let error_rate = LinguisticVariable::new(
            Variable::ErrorRate,
            -5.0,
            5.0,
            &[
                (NB, Shape::trapezoidal(-5.0, -5.0, -4.0, -2.0)?),
                (NM, Shape::triangular(-4.0, -2.0, -1.0)?),
                (NS, Shape::triangular(-2.0, -1.0, 0.0)?),
                (ZE, Shape::triangular(-1.0, 0.0, 1.0)?),
                (PS, Shape::triangular(0.0, 1.0, 2.0)?),
                (PM, Shape::triangular(1.0, 2.0, 4.0)?),
                (PB, Shape::trapezoidal(2.0, 4.0, 5.0, 5.0)?),
            ],
        )?;

        let external_temperature = LinguisticVariable::new(
            Variable::ExternalTemperature,
            10.0,
            35.0,
            &[
                (Low, Shape::trapezoidal(10.0, 10.0, 15.0, 20.0)?),
                (Medium, Shape::triangular(15.0, 22.0, 28.0)?),
                (High, Shape::trapezoidal(25.0, 30.0, 35.0, 35.0)?),
            ],
        )?;

        let thermal_load = LinguisticVariable::new(
            Variable::ThermalLoad,
            0.0,
            100.0,
            &[
                (Low, Shape::trapezoidal(0.0, 0.0, 20.0, 40.0)?),
                (Medium, Shape::triangular(30.0, 50.0, 70.0)?),
                (High, Shape::trapezoidal(60.0, 80.0, 100.0, 100.0)?),
            ],
        )?;

        let crac_power = LinguisticVariable::new(
            Variable::CracPower,
            0.0,
            100.0,
            &[
                (PowerTerm::VeryLow, Shape::trapezoidal(0.0, 0.0, 10.0, 25.0)?),
                (PowerTerm::Low, Shape::triangular(15.0, 30.0, 45.0)?),
                (PowerTerm::Medium, Shape::triangular(35.0, 50.0, 65.0)?),
                (PowerTerm::High, Shape::triangular(55.0, 70.0, 85.0)?),
                (PowerTerm::VeryHigh, Shape::trapezoidal(75.0, 90.0, 100.0, 100.0)?),
            ],
        )?;

        // Order must follow Variable::ALL.
        Ok(MembershipLibrary {
            variables: vec![error, error_rate, external_temperature, thermal_load, crac_power],
        })
    }

    pub fn variable(&self, variable: Variable) -> &LinguisticVariable {
        &self.variables[variable.index()]
    }

    pub fn output(&self) -> &LinguisticVariable {
        self.variable(Variable::CracPower)
    }

    fn lookup(&self, variable: &str, term: &str) -> FuzzyResult<&Shape> {
        let variable: Variable = variable.parse()?;
        self.variable(variable).shape(term)
    }

    /// Degree of membership of `value` in `term` of `variable`, both given by
    /// name.
    pub fn membership(&self, variable: &str, term: &str, value: f64) -> FuzzyResult<f64> {
        Ok(self.lookup(variable, term)?.degree(value))
    }

    /// Vectorized form of [`MembershipLibrary::membership`].
    pub fn membership_many(
        &self,
        variable: &str,
        term: &str,
        values: &[f64],
    ) -> FuzzyResult<Vec<f64>> {
        let shape = self.lookup(variable, term)?;
        Ok(values.iter().map(|x| shape.degree(*x)).collect())
    }

    /// Sampled curves of one variable.
    pub fn term_curves(&self, variable: Variable) -> VariableCurves {
        self.variable(variable).curves()
    }

    /// Sampled curves of every variable, for visualization.
    pub fn curves(&self) -> MembershipCurves {
        MembershipCurves {
            variables: self
                .variables
                .iter()
                .map(|v| (v.variable.name(), v.curves()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn library() -> MembershipLibrary {
        MembershipLibrary::standard().unwrap()
    }

    #[test]
    fn triangular_shoulders() {
        let tri = Shape::triangular(-2.0, 0.0, 2.0).unwrap();
        assert_eq!(tri.degree(-2.0), 0.0);
        assert_abs_diff_eq!(tri.degree(-1.0), 0.5);
        assert_eq!(tri.degree(0.0), 1.0);
        assert_abs_diff_eq!(tri.degree(1.5), 0.25);
        assert_eq!(tri.degree(2.0), 0.0);
        assert_eq!(tri.degree(7.0), 0.0);
    }

    #[test]
    fn trapezoidal_plateau_and_shoulders() {
        let trap = Shape::trapezoidal(0.0, 0.0, 10.0, 25.0).unwrap();
        assert_eq!(trap.degree(0.0), 1.0);
        assert_eq!(trap.degree(10.0), 1.0);
        assert_abs_diff_eq!(trap.degree(17.5), 0.5);
        assert_eq!(trap.degree(25.0), 0.0);
        assert_eq!(trap.degree(-0.1), 0.0);
    }

    #[test]
    fn vertical_edges_are_steps() {
        let left = Shape::trapezoidal(4.0, 8.0, 10.0, 10.0).unwrap();
        assert_eq!(left.degree(10.0), 1.0);
        assert_eq!(left.degree(10.0001), 0.0);
        assert!(left.degree(10.0).is_finite());

        let tri = Shape::triangular(1.0, 1.0, 3.0).unwrap();
        assert_eq!(tri.degree(1.0), 0.0);
        assert_abs_diff_eq!(tri.degree(2.0), 0.5);
        let tri = Shape::triangular(1.0, 3.0, 3.0).unwrap();
        assert_abs_diff_eq!(tri.degree(2.0), 0.5);
        assert_eq!(tri.degree(3.0), 0.0);
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        assert!(matches!(
            Shape::triangular(3.0, 2.0, 4.0),
            Err(FuzzyError::MalformedShape { .. })
        ));
        assert!(Shape::trapezoidal(0.0, 5.0, 4.0, 6.0).is_err());
        assert!(Shape::trapezoidal(1.0, 1.0, 1.0, 1.0).is_err());
        assert!(Shape::triangular(0.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn missing_term_fails_construction() {
        let err = LinguisticVariable::new(
            Variable::ThermalLoad,
            0.0,
            100.0,
            &[(LevelTerm::Low, Shape::triangular(0.0, 10.0, 20.0).unwrap())],
        )
        .unwrap_err();
        assert_eq!(
            err,
            FuzzyError::MissingTerm {
                variable: "carga_termica".to_string(),
                term: "Media".to_string()
            }
        );
    }

    #[test]
    fn lookup_by_name() {
        let lib = library();
        assert_eq!(lib.membership("erro", "ZE", 0.0).unwrap(), 1.0);
        assert_eq!(lib.membership("thermal_load", "Alta", 90.0).unwrap(), 1.0);
        assert_abs_diff_eq!(lib.membership("temp_externa", "Media", 25.0).unwrap(), 0.5);
        assert_eq!(
            lib.membership("humidity", "ZE", 0.0),
            Err(FuzzyError::UnknownVariable("humidity".to_string()))
        );
        assert!(matches!(
            lib.membership("potencia_crac", "ZE", 0.0),
            Err(FuzzyError::UnknownTerm { .. })
        ));
    }

    #[test]
    fn vectorized_matches_scalar() {
        let lib = library();
        let xs = [-5.0, -1.0, 0.0, 0.5, 3.0];
        let many = lib.membership_many("delta_erro", "NS", &xs).unwrap();
        for (x, degree) in xs.iter().zip(many) {
            assert_eq!(degree, lib.membership("delta_erro", "NS", *x).unwrap());
        }
    }

    #[test]
    fn nan_belongs_to_no_term() {
        let lib = library();
        assert_eq!(lib.membership("erro", "ZE", f64::NAN).unwrap(), 0.0);
        assert_eq!(lib.membership("erro", "PB", f64::NAN).unwrap(), 0.0);
        let many = lib.membership_many("erro", "ZE", &[f64::NAN, 0.0]).unwrap();
        assert_eq!(many, vec![0.0, 1.0]);
        assert_eq!(lib.variable(Variable::ThermalLoad).fuzzify(f64::NAN).max(), 0.0);
    }

    #[test]
    fn term_curves_of_one_variable() {
        let lib = library();
        let curves = lib.term_curves(Variable::ExternalTemperature);
        assert_eq!(curves.universe.len(), RESOLUTION);
        let codes: Vec<_> = curves.terms.iter().map(|(code, _)| *code).collect();
        assert_eq!(codes, vec!["Baixa", "Media", "Alta"]);
        assert_eq!(curves.term("Baixa").unwrap()[0], 1.0);
        assert_eq!(curves.term("Alta").unwrap()[RESOLUTION - 1], 1.0);
        assert!(curves.term("ZE").is_none());

        let all = lib.curves();
        let same = all.variable("temp_externa").unwrap();
        assert_eq!(same.universe, curves.universe);
        assert_eq!(same.terms, curves.terms);
    }

    #[test]
    fn universe_spans_range() {
        let lib = library();
        for variable in Variable::ALL {
            let v = lib.variable(variable);
            let universe = v.universe();
            assert_eq!(universe.len(), RESOLUTION);
            assert_eq!(universe[0], v.range().0);
            assert_eq!(universe[RESOLUTION - 1], v.range().1);
            assert!(universe.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn partitions_have_no_dead_zones() {
        let lib = library();
        for variable in Variable::ALL {
            let v = lib.variable(variable);
            let (min, max) = v.range();
            for i in 0..=2000 {
                let x = min + (max - min) * i as f64 / 2000.0;
                assert!(
                    v.fuzzify(x).max() > 0.0,
                    "{} has no active term at {}",
                    variable,
                    x
                );
            }
        }
    }

    #[test]
    fn term_codes_follow_enum_order() {
        let lib = library();
        let codes: Vec<_> = lib.variable(Variable::ErrorRate).term_codes().collect();
        let expected: Vec<_> = DeviationTerm::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes, expected);
        let codes: Vec<_> = lib.output().term_codes().collect();
        assert_eq!(codes, vec!["MB", "B", "M", "A", "MA"]);
        assert_eq!(PowerTerm::from_code("MA"), Some(PowerTerm::VeryHigh));
        assert_eq!(LevelTerm::from_code("Media"), Some(LevelTerm::Medium));
        assert_eq!(LevelTerm::from_code("Medium"), None);
    }
}
