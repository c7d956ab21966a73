//! Errors for join planning.

/// A type for join-planning errors. Every failure here is fatal to the
/// compilation; callers should not attempt the query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("could not convert the criteria into a statement: {0}")]
    Conversion(#[from] query_engine_compiler::compiler::error::Error),

    #[error(
        "could not determine the primary key column for table `{0}`; the \
         supplied lookup returned nothing"
    )]
    PrimaryKeyLookup(String),

    #[error("the join set for alias `{0}` contains no instructions")]
    EmptyJoinSet(String),
}
