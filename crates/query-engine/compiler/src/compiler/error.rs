//! Errors for criteria compilation.

use query_engine_statement::statement::json::WireError;

/// A type for compilation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("convert must contain a model to use to build the query")]
    MissingModel,

    #[error("convert must contain a method to use to build the query")]
    MissingMethod,

    #[error("criteria must contain a WHERE clause")]
    MissingWhereClause,

    #[error("invalid where clause: {0}")]
    InvalidWhereClause(String),

    #[error(
        "when using a NOT EQUAL modifier it may not be used with other modifiers \
         on an attribute in the same clause"
    )]
    NotCombinedWithOtherModifiers,

    #[error("queries may only contain one {0} aggregation")]
    MultipleAggregateFields(&'static str),

    #[error("the field to {0} must be a string")]
    InvalidAggregateField(&'static str),

    #[error("join instructions are in an invalid format: {0}")]
    InvalidJoinInstructions(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("unbalanced token stream: {0}")]
    UnbalancedTokens(String),
}

/// The broad classification of a compilation error, for callers that
/// map failures onto user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input to the compiler itself.
    Usage,
    /// A semantically contradictory predicate.
    InvalidCriteria,
    /// A join could not be planned.
    Planner,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotCombinedWithOtherModifiers => ErrorKind::InvalidCriteria,
            Error::InvalidJoinInstructions(_) => ErrorKind::Planner,
            _ => ErrorKind::Usage,
        }
    }
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Error {
        Error::InvalidExpression(err.0)
    }
}
