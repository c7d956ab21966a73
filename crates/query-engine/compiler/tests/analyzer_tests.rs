//! Clause grouping for representative token streams.

use serde_json::{json, Value};

use query_engine_compiler::compiler::analyzer::{analyze, analyze_deferred, Chunk, Node};
use query_engine_compiler::compiler::tokenizer::tokenize;
use query_engine_statement::statement::ast::*;
use query_engine_statement::statement::helpers;

fn token(t: Token) -> Node {
    Node::Token(t)
}

fn value(v: Value) -> Node {
    token(Token::Value(v))
}

fn key(k: &str) -> Node {
    token(Token::Key(k.to_string()))
}

fn group(nodes: Vec<Node>) -> Node {
    Node::Group(nodes)
}

fn select_star_chunks() -> Vec<Chunk> {
    vec![
        vec![token(Token::Identifier(Clause::Select)), value(json!("*"))],
        vec![
            token(Token::Identifier(Clause::From)),
            value(json!("users")),
        ],
    ]
}

#[test]
fn and_branches_stay_flat_after_the_condition() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::And(vec![
            helpers::eq("firstName", json!("foo")),
            helpers::eq("lastName", json!("bar")),
        ])),
        ..Statement::default()
    };

    let mut expected = select_star_chunks();
    expected.push(vec![
        token(Token::Identifier(Clause::Where)),
        token(Token::Condition(Condition::And)),
        group(vec![key("firstName"), value(json!("foo"))]),
        group(vec![key("lastName"), value(json!("bar"))]),
    ]);

    similar_asserts::assert_eq!(analyze(&tokenize(&statement)).unwrap(), expected);
}

#[test]
fn nested_or_branches_become_sibling_arrays() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::And(vec![
            Predicate::Or(vec![
                helpers::eq("firstName", json!("John")),
                helpers::eq("lastName", json!("Smith")),
            ]),
            Predicate::Or(vec![
                helpers::compare("qty", Operator::GreaterThan, json!(100)),
                helpers::compare("price", Operator::LessThan, json!(10.0)),
            ]),
        ])),
        ..Statement::default()
    };

    let mut expected = select_star_chunks();
    expected.push(vec![
        token(Token::Identifier(Clause::Where)),
        token(Token::Condition(Condition::And)),
        group(vec![
            group(vec![key("firstName"), value(json!("John"))]),
            group(vec![key("lastName"), value(json!("Smith"))]),
        ]),
        group(vec![
            group(vec![
                key("qty"),
                token(Token::Operator(Operator::GreaterThan)),
                value(json!(100)),
            ]),
            group(vec![
                key("price"),
                token(Token::Operator(Operator::LessThan)),
                value(json!(10.0)),
            ]),
        ]),
    ]);

    similar_asserts::assert_eq!(analyze(&tokenize(&statement)).unwrap(), expected);
}

#[test]
fn or_itself_is_dropped_but_its_groups_survive() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::Or(vec![
            Predicate::Or(vec![
                helpers::eq("id", json!(1)),
                helpers::compare("id", Operator::LessThan, json!(10)),
            ]),
            helpers::leaf("name", Constraint::NotEquals(json!("Tester"))),
        ])),
        ..Statement::default()
    };

    let mut expected = select_star_chunks();
    expected.push(vec![
        token(Token::Identifier(Clause::Where)),
        group(vec![
            group(vec![key("id"), value(json!(1))]),
            group(vec![
                key("id"),
                token(Token::Operator(Operator::LessThan)),
                value(json!(10)),
            ]),
        ]),
        group(vec![
            key("name"),
            token(Token::Condition(Condition::Not)),
            value(json!("Tester")),
        ]),
    ]);

    similar_asserts::assert_eq!(analyze(&tokenize(&statement)).unwrap(), expected);
}

#[test]
fn a_multi_leaf_or_branch_stays_one_array() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        where_: Some(Predicate::Or(vec![
            helpers::eq("name", json!("John")),
            Predicate::Conjunction(vec![
                helpers::compare("votes", Operator::GreaterThan, json!(100)),
                helpers::leaf("title", Constraint::NotEquals(json!("Admin"))),
            ]),
        ])),
        ..Statement::default()
    };

    let mut expected = select_star_chunks();
    expected.push(vec![
        token(Token::Identifier(Clause::Where)),
        group(vec![key("name"), value(json!("John"))]),
        group(vec![
            key("votes"),
            token(Token::Operator(Operator::GreaterThan)),
            value(json!(100)),
            key("title"),
            token(Token::Condition(Condition::Not)),
            value(json!("Admin")),
        ]),
    ]);

    similar_asserts::assert_eq!(analyze(&tokenize(&statement)).unwrap(), expected);
}

#[test]
fn mutation_clauses_chunk_in_order() {
    let mut values = indexmap::IndexMap::new();
    values.insert("title".to_string(), json!("Slaughterhouse Five"));
    let statement = Statement {
        insert: Some(values),
        into: Some("books".to_string()),
        returning: Some(Returning::Columns(vec![
            "author".to_string(),
            "title".to_string(),
        ])),
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        analyze(&tokenize(&statement)).unwrap(),
        vec![
            vec![
                token(Token::Identifier(Clause::Insert)),
                key("title"),
                value(json!("Slaughterhouse Five")),
            ],
            vec![
                token(Token::Identifier(Clause::Into)),
                value(json!("books")),
            ],
            vec![
                token(Token::Identifier(Clause::Returning)),
                value(json!("author")),
                value(json!("title")),
            ],
        ]
    );
}

#[test]
fn derived_from_clauses_group_as_one_unit() {
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
        analyze(&tokenize(&statement)).unwrap(),
        vec![
            vec![
                token(Token::Identifier(Clause::Avg)),
                value(json!("age")),
            ],
            vec![
                token(Token::Identifier(Clause::From)),
                group(vec![
                    group(vec![
                        token(Token::Identifier(Clause::Select)),
                        value(json!("age")),
                    ]),
                    group(vec![
                        token(Token::Identifier(Clause::From)),
                        value(json!("users")),
                    ]),
                    group(vec![
                        token(Token::Identifier(Clause::Limit)),
                        value(json!(10)),
                    ]),
                ]),
                key("as"),
                value(json!("avg")),
            ],
        ]
    );
}

#[test]
fn union_members_are_written_as_units() {
    let member = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("pets".to_string())),
        where_: Some(helpers::eq("user_id", json!(1))),
        ..Statement::default()
    };
    let statement = Statement {
        union_all: vec![member],
        ..Statement::default()
    };

    similar_asserts::assert_eq!(
        analyze(&tokenize(&statement)).unwrap(),
        vec![vec![group(vec![
            token(Token::Union),
            group(vec![
                group(vec![
                    token(Token::Identifier(Clause::Select)),
                    value(json!("*")),
                ]),
                group(vec![
                    token(Token::Identifier(Clause::From)),
                    value(json!("pets")),
                ]),
                group(vec![
                    token(Token::Identifier(Clause::Where)),
                    key("user_id"),
                    value(json!(1)),
                ]),
            ]),
        ])]]
    );
}

#[tokio::test]
async fn deferred_analysis_matches_the_synchronous_form() {
    let statement = Statement {
        select: Some(vec!["*".to_string()]),
        from: Some(From::Table("users".to_string())),
        skip: Some(10),
        ..Statement::default()
    };
    let tokens = tokenize(&statement);

    similar_asserts::assert_eq!(
        analyze_deferred(&tokens).await.unwrap(),
        analyze(&tokens).unwrap()
    );
}
