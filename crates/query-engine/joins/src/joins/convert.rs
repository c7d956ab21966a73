//! Decide between single-query and multi-query join execution, and build
//! the statements for whichever applies.
//!
//! Criteria on a population filters the children, not the parents, so it
//! cannot simply fold into the parent query. Any populated alias carrying
//! restrictions (or reaching a child table already joined through a
//! different key) forces a "slow join": the parent query runs first and a
//! templated child query runs afterward, filled with the parent keys. An
//! unpaginated association batches into one `IN` query; a paginated one
//! runs once per parent row with the results combined UNION ALL style.

use indexmap::IndexMap;
use serde_json::{json, Value};

use query_engine_compiler::compiler::converter::{convert, ConvertOptions, Method};
use query_engine_compiler::compiler::criteria::{
    Criteria, JoinInstruction, JoinSet, Strategy,
};
use query_engine_statement::statement::ast::{Constraint, Opts, Predicate, Statement};
use query_engine_statement::statement::helpers;

use crate::joins::error::Error;
use crate::joins::expand::expand_criteria;
use crate::joins::planner::{plan, GetPk};

/// Everything [`convert_join_criteria`] needs.
pub struct ConvertJoinOptions<'a> {
    pub table_name: &'a str,
    pub schema_name: &'a str,
    pub get_pk: GetPk<'a>,
    pub criteria: Criteria,
}

/// How a child template is executed once rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Executed once, with the placeholder filled by every parent key.
    In,
    /// Executed once per parent row, results combined with UNION ALL.
    Union,
}

/// A deferred child query: a statement with a placeholder to be filled
/// after the parent query has run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildStatement {
    pub query_type: QueryType,
    pub statement: Statement,
    /// The column whose values link child rows back to parents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key_attr: Option<String>,
    pub instructions: Vec<JoinInstruction>,
    pub alias: String,
    /// Index of the placeholder leaf in the statement's top-level `And`.
    /// Recorded at template build time: a sub-criteria may legitimately
    /// contain leaves of the same shape as the placeholder (an empty IN
    /// filter, an equality against the literal string `"?"`), so the
    /// placeholder cannot be rediscovered by scanning.
    pub placeholder_branch: usize,
}

/// The output of join-criteria conversion: a parent statement and zero or
/// more child templates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPlan {
    pub parent_statement: Statement,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_statements: Vec<ChildStatement>,
}

/// Inspect a criteria for joins and build the statements needed to run it.
pub fn convert_join_criteria(options: ConvertJoinOptions) -> Result<JoinPlan, Error> {
    if options.table_name.is_empty() {
        return Err(Error::InvalidOptions(
            "missing or invalid tableName".to_string(),
        ));
    }
    if options.schema_name.is_empty() {
        return Err(Error::InvalidOptions(
            "missing or invalid schemaName".to_string(),
        ));
    }

    let opts = Opts {
        schema: options.schema_name.to_string(),
    };

    // Without joins there is nothing to plan.
    if options.criteria.joins.is_none() && options.criteria.instructions.is_none() {
        let parent_statement = convert_find(
            options.table_name,
            options.criteria,
            &opts,
        )?;
        return Ok(JoinPlan {
            parent_statement,
            child_statements: Vec::new(),
        });
    }

    let criteria = plan(options.criteria, options.get_pk)?;
    let instructions = criteria.instructions.clone().unwrap_or_default();

    let slow_aliases = classify_slow_aliases(&instructions);
    tracing::debug!(
        table = options.table_name,
        slow = slow_aliases.len(),
        "planned join execution"
    );

    if slow_aliases.is_empty() {
        let mut parent_statement = convert_find(options.table_name, criteria, &opts)?;

        // Junction joins need the junction's parent-side FK surfaced so
        // child rows can be stitched back without keeping the junction
        // rows around.
        for join_set in instructions.values() {
            if let Strategy::ManyToManyViaJunction { .. } = join_set.strategy {
                let (junctor, child) = junction_edges(join_set)?;
                let entry = format!(
                    "{}.{} as {}___parent_fk",
                    junctor.child, junctor.child_key, child.alias
                );
                parent_statement
                    .select
                    .get_or_insert_with(Vec::new)
                    .push(entry);
            }
        }

        parent_statement.where_ = parent_statement
            .where_
            .map(|where_| expand_criteria(where_, options.table_name));
        return Ok(JoinPlan {
            parent_statement,
            child_statements: Vec::new(),
        });
    }

    // The parent query runs with the slow aliases stripped out; its only
    // job is to return parent rows whose keys feed the child templates.
    let mut stripped = criteria.clone();
    if let Some(map) = &mut stripped.instructions {
        for alias in &slow_aliases {
            map.shift_remove(alias);
        }
        if map.is_empty() {
            stripped.instructions = None;
        }
    }
    let mut parent_statement = convert_find(options.table_name, stripped, &opts)?;
    parent_statement.where_ = parent_statement
        .where_
        .map(|where_| expand_criteria(where_, options.table_name));

    let mut child_statements = Vec::new();
    for alias in &slow_aliases {
        let join_set = instructions
            .get(alias)
            .ok_or_else(|| Error::EmptyJoinSet(alias.clone()))?;
        match &join_set.strategy {
            // The parent rows already carry the foreign key; the executor
            // resolves these with a plain find, no template needed.
            Strategy::BelongsTo { .. } => {}
            Strategy::HasMany { .. } => {
                child_statements.push(has_many_template(
                    alias,
                    join_set,
                    options.get_pk,
                    &opts,
                )?);
            }
            Strategy::ManyToManyViaJunction { .. } => {
                child_statements.push(junction_template(alias, join_set, &opts)?);
            }
        }
    }

    Ok(JoinPlan {
        parent_statement,
        child_statements,
    })
}

fn convert_find(model: &str, criteria: Criteria, opts: &Opts) -> Result<Statement, Error> {
    Ok(convert(&ConvertOptions {
        model: model.to_string(),
        method: Some(Method::Find),
        criteria: Some(criteria),
        values: None,
        opts: Some(opts.clone()),
    })?)
}

/// An alias is slow when its sub-criteria restricts the children, or when
/// its child table was already joined through a different key by another
/// alias. The latter happens when one model populates several attributes
/// backed by the same table via different keys; folding both into one
/// query would cross-multiply the rows.
fn classify_slow_aliases(instructions: &IndexMap<String, JoinSet>) -> Vec<String> {
    let mut join_maps: IndexMap<String, String> = IndexMap::new();
    let mut slow_aliases: Vec<String> = Vec::new();

    for (alias, join_set) in instructions {
        for edge in &join_set.instructions {
            match join_maps.get(&edge.child) {
                Some(known_key) if known_key != &edge.child_key => {
                    if !slow_aliases.contains(alias) {
                        slow_aliases.push(alias.clone());
                    }
                    continue;
                }
                _ => {
                    join_maps.insert(edge.child.clone(), edge.child_key.clone());
                }
            }

            if edge
                .criteria
                .as_ref()
                .is_some_and(Criteria::has_restrictions)
                && !slow_aliases.contains(alias)
            {
                slow_aliases.push(alias.clone());
            }
        }
    }

    slow_aliases
}

fn has_many_template(
    alias: &str,
    join_set: &JoinSet,
    get_pk: GetPk,
    opts: &Opts,
) -> Result<ChildStatement, Error> {
    let edge = join_set
        .parent_edge()
        .ok_or_else(|| Error::EmptyJoinSet(alias.to_string()))?;

    let mut sub_criteria = edge.criteria.clone().unwrap_or_default();
    let paginated = sub_criteria.is_paginated();
    if sub_criteria.where_.is_none() {
        sub_criteria.where_ = Some(json!({}));
    }

    let mut statement = convert_find(&edge.child, sub_criteria, opts)?;
    // A populate without a select keeps the converter's `["*"]` default.
    if !edge.select.is_empty() {
        statement.select = Some(edge.select.clone());
    }

    let primary_key_attr = get_pk(&edge.child)
        .ok_or_else(|| Error::PrimaryKeyLookup(edge.child.clone()))?;

    let (query_type, placeholder) = placeholder_for(paginated);
    let placeholder_branch = append_placeholder(&mut statement, &edge.child_key, placeholder);

    Ok(ChildStatement {
        query_type,
        statement,
        primary_key_attr: Some(primary_key_attr),
        instructions: vec![edge.clone()],
        alias: alias.to_string(),
        placeholder_branch,
    })
}

fn junction_template(
    alias: &str,
    join_set: &JoinSet,
    opts: &Opts,
) -> Result<ChildStatement, Error> {
    let (junctor, child_edge) = junction_edges(join_set)?;

    let mut sub_criteria = child_edge.criteria.clone().unwrap_or_default();
    let paginated = sub_criteria.is_paginated();
    if sub_criteria.where_.is_none() {
        sub_criteria.where_ = Some(json!({}));
    }

    // The template queries the junction table and joins the child through
    // it, so the child criteria carries just the junction-to-child edge.
    let template_set = JoinSet {
        strategy: join_set.strategy.clone(),
        instructions: vec![child_edge.clone()],
    };
    let mut template_instructions = IndexMap::new();
    template_instructions.insert(alias.to_string(), template_set);
    sub_criteria.instructions = Some(template_instructions);

    let mut statement = convert_find(&junctor.child, sub_criteria, opts)?;

    // Child columns are selected plainly (the reassembler works from the
    // stitching key, not aliased columns), plus the junction's parent FK.
    let mut select: Vec<String> = if child_edge.select.is_empty() {
        vec![format!("{}.*", child_edge.child)]
    } else {
        child_edge
            .select
            .iter()
            .map(|column| helpers::qualify_column(&child_edge.child, column))
            .collect()
    };
    select.push(format!(
        "{}.{} as _parent_fk",
        junctor.child, junctor.child_key
    ));
    statement.select = Some(select);

    let (query_type, placeholder) = placeholder_for(paginated);
    let placeholder_branch = append_placeholder(&mut statement, &junctor.child_key, placeholder);

    Ok(ChildStatement {
        query_type,
        statement,
        primary_key_attr: Some(junctor.child_key.clone()),
        instructions: vec![junctor.clone(), child_edge.clone()],
        alias: alias.to_string(),
        placeholder_branch,
    })
}

fn junction_edges(join_set: &JoinSet) -> Result<(&JoinInstruction, &JoinInstruction), Error> {
    match join_set.instructions.as_slice() {
        [junctor, child] => Ok((junctor, child)),
        _ => Err(Error::InvalidOptions(
            "a junction join set must contain exactly two edges".to_string(),
        )),
    }
}

fn placeholder_for(paginated: bool) -> (QueryType, Constraint) {
    if paginated {
        (QueryType::Union, Constraint::Equals(json!("?")))
    } else {
        (QueryType::In, Constraint::In(Vec::new()))
    }
}

/// Append the placeholder leaf to the statement's `where` clause and
/// return its branch index in the resulting top-level `And`.
fn append_placeholder(statement: &mut Statement, attribute: &str, constraint: Constraint) -> usize {
    helpers::push_and_branch(statement, helpers::leaf(attribute, constraint));
    match &statement.where_ {
        Some(Predicate::And(branches)) => branches.len() - 1,
        _ => 0,
    }
}

impl ChildStatement {
    /// The placeholder constraint at the recorded branch index.
    fn placeholder<'a>(&self, statement: &'a mut Statement) -> Result<&'a mut Constraint, Error> {
        let branches = match statement.where_.as_mut() {
            Some(Predicate::And(branches)) => branches,
            _ => {
                return Err(Error::InvalidOptions(
                    "the template carries no conjunction to fill".to_string(),
                ));
            }
        };
        match branches.get_mut(self.placeholder_branch) {
            Some(Predicate::Leaf { constraint, .. }) => Ok(constraint),
            _ => Err(Error::InvalidOptions(
                "the template's placeholder branch is missing".to_string(),
            )),
        }
    }

    /// Render an `in` template by filling its placeholder with every
    /// parent key at once.
    pub fn render_in(&self, keys: &[Value]) -> Result<Statement, Error> {
        let mut statement = self.statement.clone();
        match self.placeholder(&mut statement)? {
            Constraint::In(values) => *values = keys.to_vec(),
            _ => {
                return Err(Error::InvalidOptions(
                    "the template carries no IN placeholder to fill".to_string(),
                ));
            }
        }
        Ok(statement)
    }

    /// Render a `union` template into one UNION ALL statement with a
    /// branch per parent key.
    pub fn render_union(&self, keys: &[Value]) -> Result<Statement, Error> {
        let mut members = Vec::with_capacity(keys.len());
        for key in keys {
            let mut member = self.statement.clone();
            match self.placeholder(&mut member)? {
                Constraint::Equals(value) => *value = key.clone(),
                _ => {
                    return Err(Error::InvalidOptions(
                        "the template carries no per-row placeholder to fill".to_string(),
                    ));
                }
            }
            members.push(member);
        }
        Ok(Statement {
            union_all: members,
            ..Statement::default()
        })
    }
}
