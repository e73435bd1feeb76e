use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FuzzyError {
    #[error("unknown linguistic variable: {0}")]
    UnknownVariable(String),

    #[error("unknown term {term} for variable {variable}")]
    UnknownTerm { variable: String, term: String },

    #[error("malformed membership shape {points:?}: {reason}")]
    MalformedShape { points: Vec<f64>, reason: String },

    #[error("variable {variable} has no shape for term {term}")]
    MissingTerm { variable: String, term: String },

    #[error("rule base is empty")]
    EmptyRuleBase,
}

pub type FuzzyResult<T> = Result<T, FuzzyError>;
