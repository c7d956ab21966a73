//! Expand raw populate instructions into normalized join sets.
//!
//! A populate call hands the compiler a flat list of join edges. The
//! planner groups them by alias and tags each group with the strategy
//! that reaches the association: a parent-owned foreign key, a foreign
//! key on the child, or a two-edge hop through a junction table.

use indexmap::IndexMap;

use query_engine_compiler::compiler::criteria::{
    Criteria, JoinInstruction, JoinSet, Strategy,
};

use crate::joins::error::Error;

/// Look up the primary key column of a table. Supplied by the schema
/// collaborator.
pub type GetPk<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Replace a criteria's raw `joins` with planned `instructions`. A
/// criteria without joins passes through unchanged.
pub fn plan(mut criteria: Criteria, get_pk: GetPk) -> Result<Criteria, Error> {
    let Some(joins) = criteria.joins.take() else {
        return Ok(criteria);
    };

    let mut groups: IndexMap<String, Vec<JoinInstruction>> = IndexMap::new();
    for join in joins {
        groups.entry(join.alias.clone()).or_default().push(join);
    }

    let mut instructions = IndexMap::new();
    for (alias, mut edges) in groups {
        for edge in &mut edges {
            hoist_select(edge);
        }
        let strategy = classify(&alias, &edges, get_pk)?;
        instructions.insert(
            alias,
            JoinSet {
                strategy,
                instructions: edges,
            },
        );
    }

    criteria.instructions = Some(instructions);
    Ok(criteria)
}

/// Move a select list out of an edge's sub-criteria onto the edge itself.
/// Shaping the column list never forces a slow join, so a sub-criteria
/// that only selects must end up empty.
fn hoist_select(edge: &mut JoinInstruction) {
    if !edge.select.is_empty() {
        return;
    }
    if let Some(criteria) = &mut edge.criteria {
        if let Some(select) = criteria.select.take() {
            edge.select = select;
        }
    }
}

fn classify(alias: &str, edges: &[JoinInstruction], get_pk: GetPk) -> Result<Strategy, Error> {
    match edges {
        [] => Err(Error::EmptyJoinSet(alias.to_string())),
        [edge] => {
            let pk = get_pk(&edge.parent)
                .ok_or_else(|| Error::PrimaryKeyLookup(edge.parent.clone()))?;
            // A collection hangs off a foreign key on the child; a model
            // association means the parent row owns the key.
            if edge.collection || edge.parent_key == pk {
                Ok(Strategy::HasMany {
                    child_fk: edge.child_key.clone(),
                })
            } else {
                Ok(Strategy::BelongsTo {
                    parent_fk: edge.parent_key.clone(),
                })
            }
        }
        [junctor, _child] => Ok(Strategy::ManyToManyViaJunction {
            junction: junctor.child.clone(),
        }),
        _ => Err(Error::InvalidOptions(format!(
            "the join set for alias `{alias}` contains more than two edges"
        ))),
    }
}
