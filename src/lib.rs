//! Mamdani fuzzy controller computing cooling-unit (CRAC) power from the
//! temperature error, its rate of change, the external temperature and the
//! thermal load.
//!
//! ```no_run
//! use crac_fuzzy::{FuzzyEngine, Inputs};
//!
//! let engine = FuzzyEngine::new().expect("standard tables are valid");
//! let (power, trace) = engine.evaluate(Inputs::new(6.0, -1.0, 30.0, 70.0));
//! println!("{:.1}% from {} rules", power, trace.fired.len());
//! ```

pub mod defuzzification;
pub mod error;
pub mod inference;
pub mod membership;
pub mod report;
pub mod rules;

pub use error::{FuzzyError, FuzzyResult};
pub use inference::{Controller, FiredRule, Fuzzification, FuzzyEngine, InferenceTrace, Inputs};
pub use membership::{
    DeviationTerm, LevelTerm, LinguisticVariable, MembershipLibrary, PowerTerm, Shape, Term,
    TermDegrees, Variable,
};
pub use report::{MembershipCurves, RuleTable, TraceReport, DEFAULT_TOP_RULES};
pub use rules::{Rule, RuleBase};
