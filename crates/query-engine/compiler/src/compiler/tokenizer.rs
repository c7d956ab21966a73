//! Flatten a statement into an ordered token stream.
//!
//! Every clause opens with an `Identifier` token and closes with the
//! matching `EndIdentifier`; predicates render as `Key`/`Value` pairs with
//! `Operator`, `Condition` and numbered `Group` wrappers. The stream is
//! stack-balanced: each opening token has exactly one closing partner.

use serde_json::Value;

use query_engine_statement::statement::ast::{
    Clause, Condition, Constraint, From, Predicate, Returning, Statement, Token,
};

use crate::compiler::error::Error;

/// Tokenize a statement. Clauses are emitted in a fixed canonical order,
/// not the order the caller happened to build them in.
pub fn tokenize(statement: &Statement) -> Vec<Token> {
    let mut tokens = Vec::new();
    write_statement(statement, &mut tokens);
    tokens
}

/// Tokenize a raw JSON statement, optionally wrapped as `{expression: ...}`.
pub fn tokenize_value(value: &Value) -> Result<Vec<Token>, Error> {
    let expression = value.get("expression").unwrap_or(value);
    let statement = Statement::from_value(expression)?;
    Ok(tokenize(&statement))
}

/// The deferred invocation form. Identical output to [`tokenize`]; it
/// exists so the compiler slots into an async pipeline without a wrapper
/// at every call site.
pub async fn tokenize_deferred(statement: &Statement) -> Vec<Token> {
    tokenize(statement)
}

fn write_statement(statement: &Statement, tokens: &mut Vec<Token>) {
    if let Some(select) = &statement.select {
        write_clause(Clause::Select, tokens, |tokens| {
            for column in select {
                tokens.push(Token::Value(Value::String(column.clone())));
            }
        });
    }
    if let Some(insert) = &statement.insert {
        write_clause(Clause::Insert, tokens, |tokens| {
            for (column, value) in insert {
                tokens.push(Token::Key(column.clone()));
                tokens.push(Token::Value(value.clone()));
            }
        });
    }
    if let Some(into) = &statement.into {
        write_named(Clause::Into, into, tokens);
    }
    if let Some(update) = &statement.update {
        write_clause(Clause::Update, tokens, |tokens| {
            for (column, value) in update {
                tokens.push(Token::Key(column.clone()));
                tokens.push(Token::Value(value.clone()));
            }
        });
    }
    if let Some(using) = &statement.using {
        write_named(Clause::Using, using, tokens);
    }
    if statement.del {
        write_clause(Clause::Delete, tokens, |_| {});
    }
    if statement.count {
        write_clause(Clause::Count, tokens, |_| {});
    }
    for (clause, column) in [
        (Clause::Min, &statement.min),
        (Clause::Max, &statement.max),
        (Clause::Sum, &statement.sum),
        (Clause::Avg, &statement.avg),
    ] {
        if let Some(column) = column {
            write_named(clause, column, tokens);
        }
    }
    if let Some(from) = &statement.from {
        write_from(from, tokens);
    }
    if let Some(where_) = &statement.where_ {
        write_clause(Clause::Where, tokens, |tokens| {
            write_predicate(where_, tokens);
        });
    }
    if let Some(group_by) = &statement.group_by {
        write_named(Clause::GroupBy, group_by, tokens);
    }
    if let Some(order_by) = &statement.order_by {
        write_clause(Clause::OrderBy, tokens, |tokens| {
            for element in order_by {
                tokens.push(Token::Key(element.column.clone()));
                tokens.push(Token::Value(Value::String(
                    element.direction.as_str().to_string(),
                )));
            }
        });
    }
    if let Some(skip) = statement.skip {
        write_clause(Clause::Skip, tokens, |tokens| {
            tokens.push(Token::Value(Value::from(skip)));
        });
    }
    if let Some(limit) = statement.limit {
        write_clause(Clause::Limit, tokens, |tokens| {
            tokens.push(Token::Value(Value::from(limit)));
        });
    }
    if let Some(returning) = &statement.returning {
        write_clause(Clause::Returning, tokens, |tokens| match returning {
            Returning::Column(column) => {
                tokens.push(Token::Value(Value::String(column.clone())));
            }
            Returning::Columns(columns) => {
                for column in columns {
                    tokens.push(Token::Value(Value::String(column.clone())));
                }
            }
        });
    }
    for member in &statement.union_all {
        tokens.push(Token::Union);
        tokens.push(Token::Subquery);
        write_statement(member, tokens);
        tokens.push(Token::EndSubquery);
        tokens.push(Token::EndUnion);
    }
}

fn write_clause(clause: Clause, tokens: &mut Vec<Token>, body: impl FnOnce(&mut Vec<Token>)) {
    tokens.push(Token::Identifier(clause));
    body(tokens);
    tokens.push(Token::EndIdentifier(clause));
}

fn write_named(clause: Clause, name: &str, tokens: &mut Vec<Token>) {
    write_clause(clause, tokens, |tokens| {
        tokens.push(Token::Value(Value::String(name.to_string())));
    });
}

fn write_from(from: &From, tokens: &mut Vec<Token>) {
    tokens.push(Token::Identifier(Clause::From));
    match from {
        From::Table(table) => {
            tokens.push(Token::Value(Value::String(table.clone())));
        }
        From::Subquery { statement, alias } => {
            tokens.push(Token::Subquery);
            write_statement(statement, tokens);
            tokens.push(Token::EndSubquery);
            tokens.push(Token::Key("as".to_string()));
            tokens.push(Token::Value(Value::String(alias.clone())));
        }
    }
    tokens.push(Token::EndIdentifier(Clause::From));
}

fn write_predicate(predicate: &Predicate, tokens: &mut Vec<Token>) {
    match predicate {
        // An implicit conjunction carries no condition token of its own.
        Predicate::Conjunction(branches) => {
            for branch in branches {
                write_predicate(branch, tokens);
            }
        }
        Predicate::And(branches) => write_combinator(Condition::And, branches, tokens),
        Predicate::Or(branches) => write_combinator(Condition::Or, branches, tokens),
        Predicate::Not(inner) => {
            tokens.push(Token::Condition(Condition::Not));
            write_predicate(inner, tokens);
            tokens.push(Token::EndCondition(Condition::Not));
        }
        Predicate::Leaf {
            attribute,
            constraint,
        } => write_leaf(attribute, constraint, tokens),
    }
}

fn write_combinator(condition: Condition, branches: &[Predicate], tokens: &mut Vec<Token>) {
    // A single-branch combinator flattens: no condition, no group wrapper.
    if let [only] = branches {
        write_predicate(only, tokens);
        return;
    }
    tokens.push(Token::Condition(condition));
    for (index, branch) in branches.iter().enumerate() {
        tokens.push(Token::Group(index));
        write_predicate(branch, tokens);
        tokens.push(Token::EndGroup(index));
    }
    tokens.push(Token::EndCondition(condition));
}

fn write_leaf(attribute: &str, constraint: &Constraint, tokens: &mut Vec<Token>) {
    match constraint {
        Constraint::Equals(value) => {
            tokens.push(Token::Key(attribute.to_string()));
            tokens.push(Token::Value(value.clone()));
        }
        Constraint::NotEquals(value) => {
            tokens.push(Token::Key(attribute.to_string()));
            tokens.push(Token::Condition(Condition::Not));
            tokens.push(Token::Value(value.clone()));
            tokens.push(Token::EndCondition(Condition::Not));
        }
        Constraint::In(values) => {
            tokens.push(Token::Key(attribute.to_string()));
            tokens.push(Token::Condition(Condition::In));
            tokens.push(Token::Value(Value::Array(values.clone())));
            tokens.push(Token::EndCondition(Condition::In));
        }
        Constraint::NotIn(values) => {
            tokens.push(Token::Key(attribute.to_string()));
            tokens.push(Token::Condition(Condition::NotIn));
            tokens.push(Token::Value(Value::Array(values.clone())));
            tokens.push(Token::EndCondition(Condition::NotIn));
        }
        // Each comparison repeats the key so the stream stays flat.
        Constraint::Compare(comparisons) => {
            for (operator, value) in comparisons {
                tokens.push(Token::Key(attribute.to_string()));
                tokens.push(Token::Operator(*operator));
                tokens.push(Token::Value(value.clone()));
                tokens.push(Token::EndOperator(*operator));
            }
        }
    }
}
