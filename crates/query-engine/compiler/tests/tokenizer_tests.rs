//! Token streams for representative statements.

use serde_json::{json, Value};

use query_engine_compiler::compiler::tokenizer::{tokenize, tokenize_deferred, tokenize_value};
use query_engine_statement::statement::ast::*;
use query_engine_statement::statement::helpers;

fn value(v: Value) -> Token {
    Token::Value(v)
}

fn key(k: &str) -> Token {
    Token::Key(k.to_string())
}

#[test]
fn simple_where_statements() {
    let statement = Statement {
        select: Some(vec!["id".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::Conjunction(vec![
            helpers::eq("firstName", json!("Test")),
            helpers::eq("lastName", json!("User")),
        ])),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Select),
            value(json!("id")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Where),
            key("firstName"),
            value(json!("Test")),
            key("lastName"),
            value(json!("User")),
            Token::EndIdentifier(Clause::Where),
        ]
    );
}

#[test]
fn operators_emit_balanced_pairs() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(helpers::leaf(
            "votes",
            Constraint::Compare(vec![
                (Operator::GreaterThan, json!(100)),
                (Operator::LessThan, json!(200)),
            ]),
        )),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Select),
            value(json!("*")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Where),
            key("votes"),
            Token::Operator(Operator::GreaterThan),
            value(json!(100)),
            Token::EndOperator(Operator::GreaterThan),
            key("votes"),
            Token::Operator(Operator::LessThan),
            value(json!(200)),
            Token::EndOperator(Operator::LessThan),
            Token::EndIdentifier(Clause::Where),
        ]
    );
}

#[test]
fn not_on_an_attribute_follows_the_key() {
    let statement = Statement {
        select: Some(vec!["id".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::And(vec![
            helpers::leaf("firstName", Constraint::NotEquals(json!("Test"))),
            helpers::leaf("lastName", Constraint::NotEquals(json!("User"))),
        ])),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Select),
            value(json!("id")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Where),
            Token::Condition(Condition::And),
            Token::Group(0),
            key("firstName"),
            Token::Condition(Condition::Not),
            value(json!("Test")),
            Token::EndCondition(Condition::Not),
            Token::EndGroup(0),
            Token::Group(1),
            key("lastName"),
            Token::Condition(Condition::Not),
            value(json!("User")),
            Token::EndCondition(Condition::Not),
            Token::EndGroup(1),
            Token::EndCondition(Condition::And),
            Token::EndIdentifier(Clause::Where),
        ]
    );
}

#[test]
fn prefix_not_wraps_an_in_condition_and_stays_balanced() {
    let statement = Statement {
        select: Some(vec!["name".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(helpers::not(helpers::leaf(
            "id",
            Constraint::In(vec![json!(1), json!(2), json!(3)]),
        ))),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Select),
            value(json!("name")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Where),
            Token::Condition(Condition::Not),
            key("id"),
            Token::Condition(Condition::In),
            value(json!([1, 2, 3])),
            Token::EndCondition(Condition::In),
            Token::EndCondition(Condition::Not),
            Token::EndIdentifier(Clause::Where),
        ]
    );
}

#[test]
fn nested_combinators_restart_group_numbering() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::Or(vec![
            Predicate::Or(vec![
                helpers::leaf("id", Constraint::NotEquals(json!(1))),
                helpers::compare("id", Operator::GreaterThan, json!(10)),
            ]),
            helpers::leaf("name", Constraint::NotEquals(json!("Tester"))),
        ])),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Select),
            value(json!("*")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Where),
            Token::Condition(Condition::Or),
            Token::Group(0),
            Token::Condition(Condition::Or),
            Token::Group(0),
            key("id"),
            Token::Condition(Condition::Not),
            value(json!(1)),
            Token::EndCondition(Condition::Not),
            Token::EndGroup(0),
            Token::Group(1),
            key("id"),
            Token::Operator(Operator::GreaterThan),
            value(json!(10)),
            Token::EndOperator(Operator::GreaterThan),
            Token::EndGroup(1),
            Token::EndCondition(Condition::Or),
            Token::EndGroup(0),
            Token::Group(1),
            key("name"),
            Token::Condition(Condition::Not),
            value(json!("Tester")),
            Token::EndCondition(Condition::Not),
            Token::EndGroup(1),
            Token::EndCondition(Condition::Or),
            Token::EndIdentifier(Clause::Where),
        ]
    );
}

#[test]
fn single_branch_combinators_flatten() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::And(vec![helpers::eq("name", json!("John"))])),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Select),
            value(json!("*")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Where),
            key("name"),
            value(json!("John")),
            Token::EndIdentifier(Clause::Where),
        ]
    );
}

#[test]
fn insert_statements() {
    let mut values = indexmap::IndexMap::new();
    values.insert("title".to_string(), json!("Slaughterhouse Five"));
    let statement = Statement {
        insert: Some(values),
        into: Some("books".to_string()),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Insert),
            key("title"),
            value(json!("Slaughterhouse Five")),
            Token::EndIdentifier(Clause::Insert),
            Token::Identifier(Clause::Into),
            value(json!("books")),
            Token::EndIdentifier(Clause::Into),
        ]
    );
}

#[test]
fn delete_statements() {
    let statement = Statement {
        del: true,
        from: Some(From::Table("accounts".to_string())),
        where_: Some(helpers::eq("activated", json!(false))),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Delete),
            Token::EndIdentifier(Clause::Delete),
            Token::Identifier(Clause::From),
            value(json!("accounts")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Where),
            key("activated"),
            value(json!(false)),
            Token::EndIdentifier(Clause::Where),
        ]
    );
}

#[test]
fn aggregations_and_pagination() {
    let statement = Statement {
        min: Some("active".to_string()),
        from: Some(From::Table("users".to_string())),
        group_by: Some("count".to_string()),
        skip: Some(10),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Min),
            value(json!("active")),
            Token::EndIdentifier(Clause::Min),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::GroupBy),
            value(json!("count")),
            Token::EndIdentifier(Clause::GroupBy),
            Token::Identifier(Clause::Skip),
            value(json!(10)),
            Token::EndIdentifier(Clause::Skip),
        ]
    );
}

#[test]
fn derived_from_clauses_emit_a_subquery() {
    let statement = Statement {
        avg: Some("age".to_string()),
        from: Some(From::Subquery {
            statement: Box::new(Statement {
                select: Some(vec!["age".to_string()]),
                from: Some(From::Table("users".to_string())),
                limit: Some(10),
                ..Statement::default()
            }),
            alias: "avg".to_string(),
        }),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        tokenize(&statement),
        vec![
            Token::Identifier(Clause::Avg),
            value(json!("age")),
            Token::EndIdentifier(Clause::Avg),
            Token::Identifier(Clause::From),
            Token::Subquery,
            Token::Identifier(Clause::Select),
            value(json!("age")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("users")),
            Token::EndIdentifier(Clause::From),
            Token::Identifier(Clause::Limit),
            value(json!(10)),
            Token::EndIdentifier(Clause::Limit),
            Token::EndSubquery,
            key("as"),
            value(json!("avg")),
            Token::EndIdentifier(Clause::From),
        ]
    );
}

#[test]
fn raw_expressions_accept_the_wrapper_form() {
    let wrapped = tokenize_value(&json!({
        "expression": {
            "select": ["*"],
            "from": "books"
        }
    }))
    .unwrap();

    similar_asserts::assert_eq!(
        wrapped,
        vec![
            Token::Identifier(Clause::Select),
            value(json!("*")),
            Token::EndIdentifier(Clause::Select),
            Token::Identifier(Clause::From),
            value(json!("books")),
            Token::EndIdentifier(Clause::From),
        ]
    );
}

#[test]
fn malformed_raw_expressions_fail() {
    assert!(tokenize_value(&json!(["not", "a", "statement"])).is_err());
}

#[tokio::test]
async fn deferred_tokenizing_matches_the_synchronous_form() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(helpers::eq("name", json!("John"))),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(tokenize_deferred(&statement).await, tokenize(&statement));
}
