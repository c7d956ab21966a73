//! The JSON wire form of statements and predicates.
//!
//! Drivers consume compiled statements as JSON-shaped values, so the wire
//! layout is part of the contract: predicates render as
//! `{"and": [...]}` / `{attr: {">": v}}` maps, derived tables carry an
//! `"as"` alias, join edges key their `on` condition by table name.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::ast::*;

/// Failure to read a statement or predicate from its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError(pub String);

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for WireError {}

fn wire_error(msg: impl Into<String>) -> WireError {
    WireError(msg.into())
}

// Predicates //

impl Predicate {
    /// Render the predicate into its wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Predicate::Conjunction(branches) => {
                let mut map = Map::new();
                for branch in branches {
                    if let Value::Object(entries) = branch.to_value() {
                        map.extend(entries);
                    }
                }
                Value::Object(map)
            }
            Predicate::And(branches) => {
                json!({ "and": branches.iter().map(Predicate::to_value).collect::<Vec<_>>() })
            }
            Predicate::Or(branches) => {
                json!({ "or": branches.iter().map(Predicate::to_value).collect::<Vec<_>>() })
            }
            Predicate::Not(inner) => json!({ "not": inner.to_value() }),
            Predicate::Leaf {
                attribute,
                constraint,
            } => {
                let mut map = Map::new();
                map.insert(attribute.clone(), constraint.to_value());
                Value::Object(map)
            }
        }
    }

    /// Read a predicate from its wire form. This is the strict parser:
    /// criteria-level sugar (`contains`, spelled-out operators, bare `!`)
    /// is the converter's concern and is rejected here.
    pub fn from_value(value: &Value) -> Result<Predicate, WireError> {
        let map = value
            .as_object()
            .ok_or_else(|| wire_error("a where clause must be a dictionary of constraints"))?;

        match map.len() {
            0 => Ok(Predicate::Conjunction(vec![])),
            1 => {
                let (key, val) = map.iter().next().ok_or_else(|| wire_error("empty clause"))?;
                Predicate::from_entry(key, val)
            }
            _ => {
                let branches = map
                    .iter()
                    .map(|(key, val)| Predicate::from_entry(key, val))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Predicate::Conjunction(branches))
            }
        }
    }

    fn from_entry(key: &str, value: &Value) -> Result<Predicate, WireError> {
        match key {
            "and" | "or" => {
                let branches = value
                    .as_array()
                    .ok_or_else(|| wire_error(format!("the value of `{key}` must be an array")))?
                    .iter()
                    .map(Predicate::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                if key == "and" {
                    Ok(Predicate::And(branches))
                } else {
                    Ok(Predicate::Or(branches))
                }
            }
            "not" => Ok(Predicate::Not(Box::new(Predicate::from_value(value)?))),
            attribute => Ok(Predicate::Leaf {
                attribute: attribute.to_string(),
                constraint: Constraint::from_value(value)?,
            }),
        }
    }
}

impl Constraint {
    pub fn to_value(&self) -> Value {
        match self {
            Constraint::Equals(v) => v.clone(),
            Constraint::NotEquals(v) => json!({ "!=": v }),
            Constraint::In(vs) => json!({ "in": vs }),
            Constraint::NotIn(vs) => json!({ "nin": vs }),
            Constraint::Compare(ops) => {
                let mut map = Map::new();
                for (op, v) in ops {
                    map.insert(op.as_str().to_string(), v.clone());
                }
                Value::Object(map)
            }
        }
    }

    pub fn from_value(value: &Value) -> Result<Constraint, WireError> {
        match value {
            // A bare array is an implicit IN condition.
            Value::Array(vs) => Ok(Constraint::In(vs.clone())),
            Value::Object(map) => {
                if map.contains_key("!=") {
                    if map.len() > 1 {
                        return Err(wire_error(
                            "a NOT EQUAL modifier may not be combined with other modifiers \
                             on the same attribute",
                        ));
                    }
                    // Not-equals against an array means NOT IN.
                    let v = &map["!="];
                    return match v {
                        Value::Array(vs) => Ok(Constraint::NotIn(vs.clone())),
                        other => Ok(Constraint::NotEquals(other.clone())),
                    };
                }
                if let Some(v) = map.get("in") {
                    if map.len() > 1 {
                        return Err(wire_error("IN may not be combined with other modifiers"));
                    }
                    let vs = v
                        .as_array()
                        .ok_or_else(|| wire_error("the value of `in` must be an array"))?;
                    return Ok(Constraint::In(vs.clone()));
                }
                if let Some(v) = map.get("nin") {
                    if map.len() > 1 {
                        return Err(wire_error("NOT IN may not be combined with other modifiers"));
                    }
                    let vs = v
                        .as_array()
                        .ok_or_else(|| wire_error("the value of `nin` must be an array"))?;
                    return Ok(Constraint::NotIn(vs.clone()));
                }
                let ops = map
                    .iter()
                    .map(|(key, v)| {
                        let op = Operator::from_str(key).ok_or_else(|| {
                            wire_error(format!("unrecognized operator `{key}` in where clause"))
                        })?;
                        Ok((op, v.clone()))
                    })
                    .collect::<Result<Vec<_>, WireError>>()?;
                if ops.is_empty() {
                    return Err(wire_error("an attribute constraint may not be empty"));
                }
                Ok(Constraint::Compare(ops))
            }
            scalar => Ok(Constraint::Equals(scalar.clone())),
        }
    }
}

// Statements //

impl Statement {
    /// Render the statement into its wire form.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(select) = &self.select {
            map.insert("select".into(), json!(select));
        }
        if let Some(insert) = &self.insert {
            map.insert("insert".into(), index_map_to_value(insert));
        }
        if let Some(into) = &self.into {
            map.insert("into".into(), json!(into));
        }
        if let Some(update) = &self.update {
            map.insert("update".into(), index_map_to_value(update));
        }
        if let Some(using) = &self.using {
            map.insert("using".into(), json!(using));
        }
        if self.del {
            map.insert("del".into(), json!(true));
        }
        if self.count {
            map.insert("count".into(), json!(true));
        }
        for (key, field) in [
            ("min", &self.min),
            ("max", &self.max),
            ("sum", &self.sum),
            ("avg", &self.avg),
        ] {
            if let Some(column) = field {
                map.insert(key.into(), json!(column));
            }
        }
        if let Some(from) = &self.from {
            map.insert("from".into(), from.to_value());
        }
        if let Some(where_) = &self.where_ {
            map.insert("where".into(), where_.to_value());
        }
        if let Some(group_by) = &self.group_by {
            map.insert("groupBy".into(), json!(group_by));
        }
        if let Some(order_by) = &self.order_by {
            let elements: Vec<Value> = order_by
                .iter()
                .map(|element| {
                    let mut entry = Map::new();
                    entry.insert(element.column.clone(), json!(element.direction.as_str()));
                    Value::Object(entry)
                })
                .collect();
            map.insert("orderBy".into(), Value::Array(elements));
        }
        if let Some(skip) = self.skip {
            map.insert("skip".into(), json!(skip));
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), json!(limit));
        }
        if let Some(returning) = &self.returning {
            let value = match returning {
                Returning::Column(column) => json!(column),
                Returning::Columns(columns) => json!(columns),
            };
            map.insert("returning".into(), value);
        }
        if !self.left_outer_join.is_empty() {
            let joins: Vec<Value> = self
                .left_outer_join
                .iter()
                .map(|join| {
                    let mut on = Map::new();
                    on.insert(join.on.parent.clone(), json!(join.on.parent_key));
                    on.insert(join.on.child.clone(), json!(join.on.child_key));
                    json!({ "from": join.from, "on": on })
                })
                .collect();
            map.insert("leftOuterJoin".into(), Value::Array(joins));
        }
        if !self.union_all.is_empty() {
            let members: Vec<Value> = self.union_all.iter().map(Statement::to_value).collect();
            map.insert("unionAll".into(), Value::Array(members));
        }
        if let Some(opts) = &self.opts {
            map.insert("opts".into(), json!({ "schema": opts.schema }));
        }
        Value::Object(map)
    }

    /// Read a statement from its wire form.
    pub fn from_value(value: &Value) -> Result<Statement, WireError> {
        let map = value
            .as_object()
            .ok_or_else(|| wire_error("a statement must be a dictionary of clauses"))?;

        let mut statement = Statement::default();
        for (key, val) in map {
            match key.as_str() {
                "select" => statement.select = Some(string_list(val, "select")?),
                "insert" => statement.insert = Some(value_to_index_map(val, "insert")?),
                "into" => statement.into = Some(required_string(val, "into")?),
                "update" => statement.update = Some(value_to_index_map(val, "update")?),
                "using" => statement.using = Some(required_string(val, "using")?),
                "del" => statement.del = val.as_bool().unwrap_or(false),
                "count" => statement.count = val.as_bool().unwrap_or(false),
                "min" => statement.min = Some(required_string(val, "min")?),
                "max" => statement.max = Some(required_string(val, "max")?),
                "sum" => statement.sum = Some(required_string(val, "sum")?),
                "avg" => statement.avg = Some(required_string(val, "avg")?),
                "from" => statement.from = Some(From::from_value(val)?),
                "where" => statement.where_ = Some(Predicate::from_value(val)?),
                "groupBy" => statement.group_by = Some(required_string(val, "groupBy")?),
                "orderBy" => statement.order_by = Some(order_by_from_value(val)?),
                "skip" => statement.skip = Some(required_u64(val, "skip")?),
                "limit" => statement.limit = Some(required_u64(val, "limit")?),
                "returning" => {
                    statement.returning = Some(match val {
                        Value::String(column) => Returning::Column(column.clone()),
                        other => Returning::Columns(string_list(other, "returning")?),
                    });
                }
                "leftOuterJoin" => statement.left_outer_join = joins_from_value(val)?,
                "unionAll" => {
                    let members = val
                        .as_array()
                        .ok_or_else(|| wire_error("`unionAll` must be an array"))?;
                    statement.union_all = members
                        .iter()
                        .map(Statement::from_value)
                        .collect::<Result<Vec<_>, _>>()?;
                }
                "opts" => {
                    let schema = val
                        .get("schema")
                        .and_then(Value::as_str)
                        .ok_or_else(|| wire_error("`opts` must contain a schema name"))?;
                    statement.opts = Some(Opts {
                        schema: schema.to_string(),
                    });
                }
                other => {
                    return Err(wire_error(format!(
                        "unrecognized clause `{other}` in statement"
                    )));
                }
            }
        }
        Ok(statement)
    }
}

impl From {
    pub fn to_value(&self) -> Value {
        match self {
            From::Table(table) => json!(table),
            From::Subquery { statement, alias } => {
                let mut map = match statement.to_value() {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                map.insert("as".into(), json!(alias));
                Value::Object(map)
            }
        }
    }

    pub fn from_value(value: &Value) -> Result<From, WireError> {
        match value {
            Value::String(table) => Ok(From::Table(table.clone())),
            Value::Object(map) => {
                let alias = map
                    .get("as")
                    .and_then(Value::as_str)
                    .ok_or_else(|| wire_error("a derived FROM clause must carry an `as` alias"))?
                    .to_string();
                let mut inner = map.clone();
                inner.shift_remove("as");
                let statement = Statement::from_value(&Value::Object(inner))?;
                Ok(From::Subquery {
                    statement: Box::new(statement),
                    alias,
                })
            }
            _ => Err(wire_error("`from` must be a table name or a derived table")),
        }
    }
}

impl serde::Serialize for Statement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Statement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Statement::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for Predicate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Predicate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Predicate::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for OrderByElement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = Map::new();
        map.insert(self.column.clone(), json!(self.direction.as_str()));
        Value::Object(map).serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for OrderByElement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let elements =
            order_by_from_value(&Value::Array(vec![value])).map_err(serde::de::Error::custom)?;
        elements
            .into_iter()
            .next()
            .ok_or_else(|| serde::de::Error::custom("expected a sort element"))
    }
}

// Value plumbing //

fn index_map_to_value(map: &IndexMap<String, Value>) -> Value {
    let mut object = Map::new();
    for (key, value) in map {
        object.insert(key.clone(), value.clone());
    }
    Value::Object(object)
}

fn value_to_index_map(value: &Value, clause: &str) -> Result<IndexMap<String, Value>, WireError> {
    let map = value
        .as_object()
        .ok_or_else(|| wire_error(format!("`{clause}` must be a dictionary of values")))?;
    Ok(map
        .iter()
        .map(|(key, val)| (key.clone(), val.clone()))
        .collect())
}

fn string_list(value: &Value, clause: &str) -> Result<Vec<String>, WireError> {
    match value {
        Value::String(single) => Ok(vec![single.clone()]),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| wire_error(format!("`{clause}` entries must be strings")))
            })
            .collect(),
        _ => Err(wire_error(format!(
            "`{clause}` must be a string or an array of strings"
        ))),
    }
}

fn required_string(value: &Value, clause: &str) -> Result<String, WireError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wire_error(format!("`{clause}` must be a string")))
}

fn required_u64(value: &Value, clause: &str) -> Result<u64, WireError> {
    value
        .as_u64()
        .ok_or_else(|| wire_error(format!("`{clause}` must be a non-negative integer")))
}

fn order_by_from_value(value: &Value) -> Result<Vec<OrderByElement>, WireError> {
    let elements = value
        .as_array()
        .ok_or_else(|| wire_error("`orderBy` must be an array"))?;
    elements
        .iter()
        .map(|element| {
            let map = element
                .as_object()
                .filter(|map| map.len() == 1)
                .ok_or_else(|| wire_error("each `orderBy` element must be a single-key map"))?;
            let (column, direction) = map
                .iter()
                .next()
                .ok_or_else(|| wire_error("each `orderBy` element must be a single-key map"))?;
            let direction = match direction.as_str() {
                Some("ASC") | Some("asc") => SortDirection::Asc,
                Some("DESC") | Some("desc") => SortDirection::Desc,
                _ => return Err(wire_error("sort direction must be ASC or DESC")),
            };
            Ok(OrderByElement {
                column: column.clone(),
                direction,
            })
        })
        .collect()
}

fn joins_from_value(value: &Value) -> Result<Vec<JoinOn>, WireError> {
    let joins = value
        .as_array()
        .ok_or_else(|| wire_error("`leftOuterJoin` must be an array"))?;
    joins
        .iter()
        .map(|join| {
            let from = join
                .get("from")
                .and_then(Value::as_str)
                .ok_or_else(|| wire_error("a join edge must name its `from` table"))?;
            let on = join
                .get("on")
                .and_then(Value::as_object)
                .filter(|map| map.len() == 2)
                .ok_or_else(|| wire_error("a join edge must carry a two-entry `on` condition"))?;
            let mut entries = on.iter();
            let (parent, parent_key) = entries
                .next()
                .ok_or_else(|| wire_error("a join edge must carry a two-entry `on` condition"))?;
            let (child, child_key) = entries
                .next()
                .ok_or_else(|| wire_error("a join edge must carry a two-entry `on` condition"))?;
            let parent_key = parent_key
                .as_str()
                .ok_or_else(|| wire_error("join keys must be strings"))?;
            let child_key = child_key
                .as_str()
                .ok_or_else(|| wire_error("join keys must be strings"))?;
            Ok(JoinOn {
                from: from.to_string(),
                on: JoinKeys {
                    parent: parent.clone(),
                    parent_key: parent_key.to_string(),
                    child: child.clone(),
                    child_key: child_key.to_string(),
                },
            })
        })
        .collect()
}
