//! Convert a criteria plus method into a flat statement.
//!
//! A criteria arrives in up to four pieces: the model to query, the method
//! being performed, the criteria itself, and (for mutations) the values to
//! write. The converter collapses them into a single statement a driver
//! can render natively. This is the primary compilation path; the
//! tokenizer and analyzer operate on its output when a renderer wants a
//! token view instead.

use indexmap::IndexMap;
use serde_json::Value;

use query_engine_statement::statement::ast::{
    From, JoinKeys, JoinOn, Opts, Predicate, Statement,
};
use query_engine_statement::statement::helpers;

use crate::compiler::criteria::{
    normalize_where, process_where, Criteria, JoinInstruction, JoinSet,
};
use crate::compiler::error::Error;

/// The query method being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    Create,
    Find,
    FindOne,
    Destroy,
    Update,
    Count,
}

/// Everything [`convert`] needs to build a statement.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ConvertOptions {
    #[serde(default)]
    pub model: String,
    pub method: Option<Method>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<Opts>,
}

/// Build a statement from a criteria. Pure: the input options are not
/// modified, so a criteria may be handed to several compilations.
pub fn convert(options: &ConvertOptions) -> Result<Statement, Error> {
    if options.model.is_empty() {
        return Err(Error::MissingModel);
    }
    let method = options.method.ok_or(Error::MissingMethod)?;

    let empty = Criteria::default();
    let criteria = options.criteria.as_ref().unwrap_or(&empty);

    // A criteria carrying any clause at all must spell out its WHERE.
    if !criteria_is_empty(criteria) && criteria.where_.is_none() {
        return Err(Error::MissingWhereClause);
    }

    let mut statement = helpers::empty_statement();

    statement.skip = criteria.skip;
    statement.limit = criteria.limit;
    statement.order_by = criteria.sort.clone();

    let where_ = match &criteria.where_ {
        Some(raw) => normalize_where(process_where(raw)?),
        None => None,
    };

    for (aggregation, field, slot) in [
        ("average", &criteria.average, &mut statement.avg),
        ("MAX", &criteria.max, &mut statement.max),
        ("MIN", &criteria.min, &mut statement.min),
        ("SUM", &criteria.sum, &mut statement.sum),
    ] {
        if let Some(field) = field {
            *slot = Some(field.single_column(aggregation)?);
        }
    }

    match method {
        Method::Create => {
            statement.into = Some(options.model.clone());
            statement.insert = Some(options.values.clone().unwrap_or_default());
        }
        Method::Find | Method::FindOne => {
            process_find(&options.model, criteria, where_, &mut statement)?;
        }
        Method::Destroy => {
            statement.del = true;
            statement.from = Some(From::Table(options.model.clone()));
            statement.where_ = where_;
        }
        Method::Update => {
            statement.update = Some(options.values.clone().unwrap_or_default());
            statement.using = Some(options.model.clone());
            statement.where_ = where_;
        }
        Method::Count => {
            statement.count = true;
            statement.from = Some(From::Table(options.model.clone()));
            statement.where_ = where_;
        }
    }

    statement.opts = options.opts.clone();

    tracing::debug!(model = %options.model, ?method, "compiled statement");
    Ok(statement)
}

/// The deferred invocation form of [`convert`].
pub async fn convert_deferred(options: &ConvertOptions) -> Result<Statement, Error> {
    convert(options)
}

fn criteria_is_empty(criteria: &Criteria) -> bool {
    criteria == &Criteria::default()
}

fn process_find(
    model: &str,
    criteria: &Criteria,
    where_: Option<Predicate>,
    statement: &mut Statement,
) -> Result<(), Error> {
    let has_instructions = criteria.instructions.is_some();

    // A plain find defaults to every column; a joined find starts from an
    // empty list so only what the instructions hoist gets selected.
    let select = criteria.select.clone().unwrap_or_else(|| {
        if has_instructions {
            Vec::new()
        } else {
            vec!["*".to_string()]
        }
    });
    statement.select = Some(select);
    statement.from = Some(From::Table(model.to_string()));
    statement.where_ = where_;

    let aggregated = statement.avg.is_some()
        || statement.max.is_some()
        || statement.min.is_some()
        || statement.sum.is_some();
    if aggregated {
        statement.select = None;
    }

    // Averaging a paginated or sorted result set must happen over the
    // already-shaped rows, so the shaping moves into a derived table and
    // the average applies on top of it.
    if statement.avg.is_some()
        && (statement.skip.is_some() || statement.limit.is_some() || statement.order_by.is_some())
    {
        let column = statement.avg.clone().unwrap_or_default();
        let inner = Statement {
            select: Some(vec![column]),
            from: statement.from.take(),
            where_: statement.where_.take(),
            order_by: statement.order_by.take(),
            skip: statement.skip.take(),
            limit: statement.limit.take(),
            ..Statement::default()
        };
        statement.from = Some(From::Subquery {
            statement: Box::new(inner),
            alias: "avg".to_string(),
        });
    }

    if let Some(instructions) = &criteria.instructions {
        // Qualify parent columns so nothing is ambiguous once the child
        // tables join in.
        if let Some(select) = statement.select.take() {
            statement.select = Some(helpers::dedup_select(
                select
                    .iter()
                    .map(|column| helpers::qualify_column(model, column))
                    .collect(),
            ));
        }
        for join_set in instructions.values() {
            process_join_set(join_set, statement)?;
        }
        if let Some(select) = statement.select.take() {
            statement.select = Some(helpers::dedup_select(select));
        }
    }

    Ok(())
}

fn process_join_set(join_set: &JoinSet, statement: &mut Statement) -> Result<(), Error> {
    if join_set.instructions.is_empty() {
        return Err(Error::InvalidJoinInstructions(
            "a join set must contain at least one instruction".to_string(),
        ));
    }
    for instruction in &join_set.instructions {
        statement.left_outer_join.push(JoinOn {
            from: instruction.child.clone(),
            on: JoinKeys {
                parent: instruction.parent.clone(),
                parent_key: instruction.parent_key.clone(),
                child: instruction.child.clone(),
                child_key: instruction.child_key.clone(),
            },
        });

        // Hoist the association's columns to the top level, aliased so the
        // reassembler can peel them back off after execution.
        for column in instruction_select(instruction) {
            let entry =
                helpers::aliased_child_column(&instruction.child, column, &instruction.alias);
            if let Some(select) = &mut statement.select {
                select.push(entry);
            } else {
                statement.select = Some(vec![entry]);
            }
        }
    }
    Ok(())
}

/// The columns an instruction wants surfaced. Instructions written by the
/// planner carry the list directly; raw populate instructions tuck it
/// inside their sub-criteria.
pub fn instruction_select(instruction: &JoinInstruction) -> &[String] {
    if !instruction.select.is_empty() {
        return &instruction.select;
    }
    instruction
        .criteria
        .as_ref()
        .and_then(|criteria| criteria.select.as_deref())
        .unwrap_or(&[])
}
