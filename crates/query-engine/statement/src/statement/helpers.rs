//! Helpers for building statement AST values in certain shapes and patterns.

use super::ast::*;

/// An empty statement. Every clause is absent.
pub fn empty_statement() -> Statement {
    Statement::default()
}

/// A bare `SELECT * FROM table` statement.
pub fn select_star_from(table: &str) -> Statement {
    Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table(table.to_string())),
        ..Statement::default()
    }
}

/// Wrap branches in an explicit AND combinator.
pub fn and(branches: Vec<Predicate>) -> Predicate {
    Predicate::And(branches)
}

/// Wrap branches in an explicit OR combinator.
pub fn or(branches: Vec<Predicate>) -> Predicate {
    Predicate::Or(branches)
}

/// Negate a predicate.
pub fn not(predicate: Predicate) -> Predicate {
    Predicate::Not(Box::new(predicate))
}

/// A single attribute constraint.
pub fn leaf(attribute: &str, constraint: Constraint) -> Predicate {
    Predicate::Leaf {
        attribute: attribute.to_string(),
        constraint,
    }
}

/// An equality constraint leaf.
pub fn eq(attribute: &str, value: Value) -> Predicate {
    leaf(attribute, Constraint::Equals(value))
}

/// A single comparison-operator leaf.
pub fn compare(attribute: &str, operator: Operator, value: Value) -> Predicate {
    leaf(attribute, Constraint::Compare(vec![(operator, value)]))
}

/// Qualify a column with its table name, leaving already-qualified
/// columns (and aliased select entries) untouched.
pub fn qualify_column(table: &str, column: &str) -> String {
    if column.contains('.') || column.contains(" as ") {
        column.to_string()
    } else {
        format!("{}.{}", table, column)
    }
}

/// Build the aliased select entry used to hoist an association's column
/// into a joined parent query: `child.col as alias__col`.
pub fn aliased_child_column(child: &str, column: &str, alias: &str) -> String {
    format!("{}.{} as {}__{}", child, column, alias, column)
}

/// Deduplicate a select list, keeping first occurrences in order.
pub fn dedup_select(select: Vec<String>) -> Vec<String> {
    let mut seen = indexmap::IndexSet::new();
    for entry in select {
        seen.insert(entry);
    }
    seen.into_iter().collect()
}

/// Push a branch onto a statement's WHERE clause, normalizing to a
/// top-level AND when the clause is absent or implicit. Used to graft
/// child-template placeholders onto compiled statements.
pub fn push_and_branch(statement: &mut Statement, branch: Predicate) {
    let where_ = statement.where_.take();
    statement.where_ = Some(match where_ {
        None => Predicate::And(vec![branch]),
        Some(Predicate::And(mut branches)) => {
            branches.push(branch);
            Predicate::And(branches)
        }
        Some(Predicate::Conjunction(mut branches)) => {
            branches.push(branch);
            Predicate::And(branches)
        }
        Some(other) => Predicate::And(vec![other, branch]),
    });
}
