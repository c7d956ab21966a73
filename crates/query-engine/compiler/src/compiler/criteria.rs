//! The user-facing criteria tree and the rewrites that turn its loose,
//! sugared predicate form into typed [`Predicate`] values.
//!
//! A criteria is what callers hand the compiler: a dictionary of `select`,
//! `where`, `sort`, pagination and aggregation keys, plus join instructions
//! produced by the planner. The `where` value stays a raw JSON tree until
//! [`process_where`] runs, because the sugar it accepts (`contains`,
//! spelled-out comparison names, bare `!`) is wider than the statement
//! wire form allows.

use indexmap::IndexMap;
use serde_json::Value;

use query_engine_statement::statement::ast::{
    Constraint, Operator, OrderByElement, Predicate,
};

use crate::compiler::error::Error;

/// A declarative query description.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    /// The raw predicate tree. Kept loose until [`process_where`] rewrites
    /// its sugar into a typed [`Predicate`].
    #[serde(
        default,
        rename = "where",
        skip_serializing_if = "Option::is_none"
    )]
    pub where_: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<OrderByElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<AggregateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<AggregateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<AggregateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<AggregateField>,
    /// Raw join edges, straight from a populate call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joins: Option<Vec<JoinInstruction>>,
    /// Planned join sets keyed by alias, produced by the join planner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<IndexMap<String, JoinSet>>,
}

impl Criteria {
    /// Whether the criteria restricts or reorders the result set. Join
    /// sub-criteria that only shape the column list never count.
    pub fn has_restrictions(&self) -> bool {
        let where_is_empty = match &self.where_ {
            None => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        };
        !where_is_empty
            || self.sort.as_ref().is_some_and(|sort| !sort.is_empty())
            || self.skip.is_some()
            || self.limit.is_some()
    }

    /// Whether the criteria carries pagination or ordering. Paginated
    /// associations force per-parent-row child queries.
    pub fn is_paginated(&self) -> bool {
        self.skip.is_some()
            || self.limit.is_some()
            || self.sort.as_ref().is_some_and(|sort| !sort.is_empty())
    }
}

/// The field named by an aggregation key. Callers may pass a bare column
/// name or a single-element list of names.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum AggregateField {
    Column(String),
    Columns(Vec<String>),
}

impl AggregateField {
    /// Resolve to the single column the aggregation targets. More than one
    /// column, or a non-string entry, is a usage error.
    pub fn single_column(&self, aggregation: &'static str) -> Result<String, Error> {
        match self {
            AggregateField::Column(column) => Ok(column.clone()),
            AggregateField::Columns(columns) => match columns.as_slice() {
                [column] => Ok(column.clone()),
                [] => Err(Error::InvalidAggregateField(aggregation)),
                _ => Err(Error::MultipleAggregateFields(aggregation)),
            },
        }
    }
}

/// One edge in a join graph: parent table and key, child table and key,
/// plus the alias the caller populated and the child columns to surface.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinInstruction {
    pub parent: String,
    pub parent_key: String,
    pub child: String,
    pub child_key: String,
    pub alias: String,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,
    /// The association resolves to a single record.
    #[serde(default)]
    pub model: bool,
    /// The association resolves to a collection of records.
    #[serde(default)]
    pub collection: bool,
}

/// The instructions for one populated alias, tagged with the strategy the
/// planner picked for it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JoinSet {
    pub strategy: Strategy,
    pub instructions: Vec<JoinInstruction>,
}

impl JoinSet {
    /// The edge leaving the parent table. For a junction strategy this is
    /// the parent-to-junction edge.
    pub fn parent_edge(&self) -> Option<&JoinInstruction> {
        self.instructions.first()
    }

    /// The edge arriving at the child table. For a junction strategy this
    /// is the junction-to-child edge.
    pub fn child_edge(&self) -> Option<&JoinInstruction> {
        self.instructions.last()
    }
}

/// How an association is reachable from its parent table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// The parent row owns the foreign key.
    BelongsTo { parent_fk: String },
    /// The child table carries a foreign key back to the parent.
    HasMany { child_fk: String },
    /// Two edges through a junction table.
    ManyToManyViaJunction { junction: String },
}

impl Strategy {
    fn code(&self) -> u8 {
        match self {
            Strategy::BelongsTo { .. } => 1,
            Strategy::HasMany { .. } => 2,
            Strategy::ManyToManyViaJunction { .. } => 3,
        }
    }
}

impl serde::Serialize for Strategy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("strategy", &self.code())?;
        match self {
            Strategy::BelongsTo { parent_fk } => map.serialize_entry("parentFk", parent_fk)?,
            Strategy::HasMany { child_fk } => map.serialize_entry("childFk", child_fk)?,
            Strategy::ManyToManyViaJunction { junction } => {
                map.serialize_entry("junction", junction)?;
            }
        }
        map.end()
    }
}

impl<'de> serde::Deserialize<'de> for Strategy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;
        let value = Value::deserialize(deserializer)?;
        let code = value
            .get("strategy")
            .and_then(Value::as_u64)
            .ok_or_else(|| D::Error::custom("a join strategy must carry a numeric tag"))?;
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| D::Error::custom(format!("a join strategy must name `{key}`")))
        };
        match code {
            1 => Ok(Strategy::BelongsTo {
                parent_fk: field("parentFk")?,
            }),
            2 => Ok(Strategy::HasMany {
                child_fk: field("childFk")?,
            }),
            3 => Ok(Strategy::ManyToManyViaJunction {
                junction: field("junction")?,
            }),
            other => Err(D::Error::custom(format!(
                "unrecognized join strategy `{other}`"
            ))),
        }
    }
}

// Predicate sugar //

/// Rewrite a loose, sugared `where` tree into a typed predicate. Pure: the
/// input tree is never modified, so callers may hand the same criteria to
/// several compilations.
pub fn process_where(value: &Value) -> Result<Predicate, Error> {
    let map = value.as_object().ok_or_else(|| {
        Error::InvalidWhereClause("a where clause must be a dictionary of constraints".to_string())
    })?;

    match map.len() {
        0 => Ok(Predicate::Conjunction(vec![])),
        1 => {
            let (key, val) = map
                .iter()
                .next()
                .ok_or_else(|| Error::InvalidWhereClause("empty clause".to_string()))?;
            process_entry(key, val)
        }
        _ => {
            let branches = map
                .iter()
                .map(|(key, val)| process_entry(key, val))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Predicate::Conjunction(branches))
        }
    }
}

fn process_entry(key: &str, value: &Value) -> Result<Predicate, Error> {
    match key {
        "and" | "or" => {
            let branches = value
                .as_array()
                .ok_or_else(|| {
                    Error::InvalidWhereClause(format!("the value of `{key}` must be an array"))
                })?
                .iter()
                .map(process_where)
                .collect::<Result<Vec<_>, _>>()?;
            if key == "and" {
                Ok(Predicate::And(branches))
            } else {
                Ok(Predicate::Or(branches))
            }
        }
        "not" => Ok(Predicate::Not(Box::new(process_where(value)?))),
        // Legacy clause-level form: `{like: {name: 'foo%'}}` hoists each
        // attribute into its own LIKE constraint.
        "like" | "contains" | "startsWith" | "endsWith" if value.is_object() => {
            let map = value.as_object().ok_or_else(|| {
                Error::InvalidWhereClause(format!("the value of `{key}` must be a dictionary"))
            })?;
            let branches = map
                .iter()
                .map(|(attribute, pattern)| {
                    Ok(Predicate::Leaf {
                        attribute: attribute.clone(),
                        constraint: Constraint::Compare(vec![(
                            Operator::Like,
                            Value::String(like_pattern(key, pattern)?),
                        )]),
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            match branches.len() {
                1 => Ok(branches
                    .into_iter()
                    .next()
                    .unwrap_or(Predicate::Conjunction(vec![]))),
                _ => Ok(Predicate::Conjunction(branches)),
            }
        }
        attribute => Ok(Predicate::Leaf {
            attribute: attribute.to_string(),
            constraint: process_constraint(value)?,
        }),
    }
}

fn process_constraint(value: &Value) -> Result<Constraint, Error> {
    match value {
        // A bare array is an implicit IN condition.
        Value::Array(entries) => Ok(Constraint::In(entries.clone())),
        Value::Object(map) => {
            let mut modifiers: IndexMap<String, Value> = IndexMap::new();
            for (key, val) in map {
                let (canonical, val) = desugar_modifier(key, val)?;
                modifiers.insert(canonical, val);
            }

            if let Some(val) = modifiers.get("!=") {
                if modifiers.len() > 1 {
                    return Err(Error::NotCombinedWithOtherModifiers);
                }
                // Not-equals against an array means NOT IN.
                return match val {
                    Value::Array(entries) => Ok(Constraint::NotIn(entries.clone())),
                    other => Ok(Constraint::NotEquals(other.clone())),
                };
            }
            for (modifier, build) in [
                ("in", Constraint::In as fn(Vec<Value>) -> Constraint),
                ("nin", Constraint::NotIn),
            ] {
                if let Some(val) = modifiers.get(modifier) {
                    if modifiers.len() > 1 {
                        return Err(Error::InvalidWhereClause(format!(
                            "`{modifier}` may not be combined with other modifiers"
                        )));
                    }
                    let entries = val.as_array().ok_or_else(|| {
                        Error::InvalidWhereClause(format!(
                            "the value of `{modifier}` must be an array"
                        ))
                    })?;
                    return Ok(build(entries.clone()));
                }
            }

            let comparisons = modifiers
                .iter()
                .map(|(key, val)| {
                    let operator = Operator::from_str(key).ok_or_else(|| {
                        Error::InvalidWhereClause(format!(
                            "unrecognized modifier `{key}` in where clause"
                        ))
                    })?;
                    Ok((operator, val.clone()))
                })
                .collect::<Result<Vec<_>, Error>>()?;
            if comparisons.is_empty() {
                return Err(Error::InvalidWhereClause(
                    "an attribute constraint may not be empty".to_string(),
                ));
            }
            Ok(Constraint::Compare(comparisons))
        }
        scalar => Ok(Constraint::Equals(scalar.clone())),
    }
}

fn desugar_modifier(key: &str, value: &Value) -> Result<(String, Value), Error> {
    let pair = match key {
        "!" | "!==" | "not" => ("!=".to_string(), value.clone()),
        "contains" | "startsWith" | "endsWith" => (
            "like".to_string(),
            Value::String(like_pattern(key, value)?),
        ),
        "greaterThan" => (">".to_string(), value.clone()),
        "lessThan" => ("<".to_string(), value.clone()),
        "greaterThanOrEqual" => (">=".to_string(), value.clone()),
        "lessThanOrEqual" => ("<=".to_string(), value.clone()),
        other => (other.to_string(), value.clone()),
    };
    Ok(pair)
}

fn like_pattern(sugar: &str, value: &Value) -> Result<String, Error> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => {
            return Err(Error::InvalidWhereClause(format!(
                "the value of `{sugar}` must be a string"
            )));
        }
    };
    Ok(match sugar {
        "contains" => format!("%{text}%"),
        "startsWith" => format!("{text}%"),
        "endsWith" => format!("%{text}"),
        _ => text,
    })
}

/// Force a predicate into the canonical top-level shape: exactly one
/// combinator. A lone `and` or `or` passes through unchanged so the
/// rewrite is idempotent; an empty clause disappears entirely.
pub fn normalize_where(predicate: Predicate) -> Option<Predicate> {
    match predicate {
        Predicate::Conjunction(branches) if branches.is_empty() => None,
        Predicate::And(branches) => Some(Predicate::And(branches)),
        Predicate::Or(branches) => Some(Predicate::Or(branches)),
        Predicate::Conjunction(branches) => Some(Predicate::And(branches)),
        other => Some(Predicate::And(vec![other])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_statement::statement::helpers;
    use serde_json::json;

    #[test]
    fn spelled_out_comparisons_desugar_to_symbols() {
        let predicate = process_where(&json!({
            "age": { "greaterThan": 21, "lessThanOrEqual": 65 }
        }))
        .unwrap();

        similar_asserts::assert_eq!(
            predicate,
            helpers::leaf(
                "age",
                Constraint::Compare(vec![
                    (Operator::GreaterThan, json!(21)),
                    (Operator::LessThanOrEqualTo, json!(65)),
                ])
            )
        );
    }

    #[test]
    fn contains_becomes_a_like_pattern() {
        let predicate = process_where(&json!({ "name": { "contains": "foo" } })).unwrap();

        similar_asserts::assert_eq!(
            predicate,
            helpers::leaf(
                "name",
                Constraint::Compare(vec![(Operator::Like, json!("%foo%"))])
            )
        );
    }

    #[test]
    fn clause_level_like_hoists_per_attribute() {
        let predicate = process_where(&json!({ "like": { "name": "foo%" } })).unwrap();

        similar_asserts::assert_eq!(
            predicate,
            helpers::leaf(
                "name",
                Constraint::Compare(vec![(Operator::Like, json!("foo%"))])
            )
        );
    }

    #[test]
    fn bang_combined_with_another_modifier_is_rejected() {
        let err = process_where(&json!({ "age": { "!": 21, ">": 10 } })).unwrap_err();
        assert_eq!(err, Error::NotCombinedWithOtherModifiers);
    }

    #[test]
    fn bang_against_an_array_means_not_in() {
        let predicate = process_where(&json!({ "id": { "!": [1, 2] } })).unwrap();

        similar_asserts::assert_eq!(
            predicate,
            helpers::leaf("id", Constraint::NotIn(vec![json!(1), json!(2)]))
        );
    }

    #[test]
    fn normalization_wraps_bare_clauses_and_leaves_combinators_alone() {
        let bare = helpers::eq("firstName", json!("Test"));
        similar_asserts::assert_eq!(
            normalize_where(bare.clone()),
            Some(Predicate::And(vec![bare]))
        );

        let disjunction = Predicate::Or(vec![
            helpers::eq("firstName", json!("Test")),
            helpers::eq("lastName", json!("User")),
        ]);
        similar_asserts::assert_eq!(
            normalize_where(disjunction.clone()),
            Some(disjunction)
        );

        similar_asserts::assert_eq!(normalize_where(Predicate::Conjunction(vec![])), None);
    }
}
