//! Compile declarative query criteria into engine-agnostic statements.
//!
//! The pipeline has three passes. The converter turns a criteria tree
//! into a flat [`Statement`](query_engine_statement::statement::ast::Statement);
//! the tokenizer flattens a statement into an ordered token stream; the
//! analyzer re-groups that stream into the clause chunks a native-query
//! renderer walks. All passes are pure transformations over in-memory
//! values and are safe to run concurrently on independent inputs.

pub mod analyzer;
pub mod converter;
pub mod criteria;
pub mod error;
pub mod tokenizer;
