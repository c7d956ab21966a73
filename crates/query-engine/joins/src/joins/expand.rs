//! Qualify predicate attributes with their table name.
//!
//! Once child tables join into a parent query, a bare attribute in the
//! WHERE clause may match columns on several tables. Expanding the
//! criteria pins every leaf attribute to the parent table before the
//! statement is rendered.

use query_engine_statement::statement::ast::Predicate;
use query_engine_statement::statement::helpers;

/// Qualify every leaf attribute in the predicate as `table.attribute`.
/// Already-qualified attributes pass through untouched.
pub fn expand_criteria(predicate: Predicate, table: &str) -> Predicate {
    match predicate {
        Predicate::Conjunction(branches) => Predicate::Conjunction(expand_all(branches, table)),
        Predicate::And(branches) => Predicate::And(expand_all(branches, table)),
        Predicate::Or(branches) => Predicate::Or(expand_all(branches, table)),
        Predicate::Not(inner) => Predicate::Not(Box::new(expand_criteria(*inner, table))),
        Predicate::Leaf {
            attribute,
            constraint,
        } => Predicate::Leaf {
            attribute: helpers::qualify_column(table, &attribute),
            constraint,
        },
    }
}

fn expand_all(branches: Vec<Predicate>, table: &str) -> Vec<Predicate> {
    branches
        .into_iter()
        .map(|branch| expand_criteria(branch, table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_statement::statement::ast::{Constraint, Operator};
    use serde_json::json;

    #[test]
    fn leaf_attributes_get_table_qualified() {
        let predicate = Predicate::And(vec![
            helpers::eq("type", json!("beta user")),
            Predicate::Or(vec![
                helpers::compare("votes", Operator::GreaterThan, json!(100)),
                helpers::leaf("id", Constraint::In(vec![json!(1), json!(2)])),
            ]),
        ]);

        similar_asserts::assert_eq!(
            expand_criteria(predicate, "user"),
            Predicate::And(vec![
                helpers::eq("user.type", json!("beta user")),
                Predicate::Or(vec![
                    helpers::compare("user.votes", Operator::GreaterThan, json!(100)),
                    helpers::leaf("user.id", Constraint::In(vec![json!(1), json!(2)])),
                ]),
            ])
        );
    }

    #[test]
    fn qualified_attributes_are_left_alone() {
        let predicate = helpers::eq("pet.name", json!("Rex"));
        similar_asserts::assert_eq!(
            expand_criteria(predicate.clone(), "user"),
            predicate
        );
    }
}
