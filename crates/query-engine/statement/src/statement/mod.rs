//! The engine-agnostic statement representation and its token stream form.

pub mod ast;
pub mod helpers;
pub mod json;
