//! Join planning and multi-query execution support.
//!
//! Populated associations either fold into the parent query as LEFT OUTER
//! JOINs or, when they are filtered or paginated, split into a parent
//! query plus deferred child query templates. This module decides which,
//! builds the statements, and reassembles the flat joined rows afterward.

pub mod cache;
pub mod convert;
pub mod detect_children;
pub mod error;
pub mod expand;
pub mod planner;
