//! Regroup a flat token stream into nested clause chunks.
//!
//! The output is one chunk per top-level clause, in stream order. Closing
//! tokens and group markers are consumed by the grouping itself: a renderer
//! walking the chunks sees `Key`/`Value`/`Operator` tokens, the conditions
//! that still matter (`AND`, `NOT`, `IN`, `NOTIN`), and nested arrays for
//! grouped predicate branches. `OR` never survives to this layer; its
//! branches are already parallel sibling arrays.
//!
//! Grouping runs as a single left-to-right pass over an explicit stack of
//! open frames, one frame per unclosed `Group`/`Subquery`/`Union` token or
//! per clause opened inside a subquery.

use query_engine_statement::statement::ast::{Condition, Token};

use crate::compiler::error::Error;

/// One element of an analyzed chunk: a surviving token or a nested group.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Token(Token),
    Group(Vec<Node>),
}

/// A top-level clause: the identifier token followed by its content.
pub type Chunk = Vec<Node>;

enum Frame {
    Group(Vec<Node>),
    /// `wrap` is false for subqueries opened directly inside a union,
    /// whose content flattens into the union body instead of nesting.
    Subquery { nodes: Vec<Node>, wrap: bool },
    /// A clause opened while a subquery or union is active.
    SubChunk(Vec<Node>),
    Union(Vec<Node>),
}

/// Group a balanced token stream into clause chunks.
pub fn analyze(tokens: &[Token]) -> Result<Vec<Chunk>, Error> {
    let mut results: Vec<Chunk> = Vec::new();
    let mut chunk: Chunk = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for token in tokens {
        match token {
            Token::Identifier(clause) => {
                if stack.is_empty() {
                    if !chunk.is_empty() {
                        results.push(std::mem::take(&mut chunk));
                    }
                    chunk.push(Node::Token(Token::Identifier(*clause)));
                } else {
                    let mut nodes = Vec::new();
                    nodes.push(Node::Token(Token::Identifier(*clause)));
                    stack.push(Frame::SubChunk(nodes));
                }
            }
            Token::EndIdentifier(_) => {
                if matches!(stack.last(), Some(Frame::SubChunk(_))) {
                    if let Some(Frame::SubChunk(nodes)) = stack.pop() {
                        append(&mut stack, &mut chunk, Node::Group(nodes));
                    }
                }
            }
            Token::Key(_) | Token::Value(_) | Token::Operator(_) => {
                append(&mut stack, &mut chunk, Node::Token(token.clone()));
            }
            Token::EndOperator(_) | Token::EndCondition(_) => {}
            Token::Condition(condition) => match condition {
                // OR branches are already parallel groups.
                Condition::Or => {}
                Condition::And | Condition::Not | Condition::In | Condition::NotIn => {
                    append(&mut stack, &mut chunk, Node::Token(token.clone()));
                }
            },
            Token::Group(_) => stack.push(Frame::Group(Vec::new())),
            Token::EndGroup(index) => match stack.pop() {
                Some(Frame::Group(nodes)) => {
                    append(&mut stack, &mut chunk, Node::Group(nodes));
                }
                _ => {
                    return Err(Error::UnbalancedTokens(format!(
                        "ENDGROUP {index} closes no open group"
                    )));
                }
            },
            Token::Subquery => {
                let wrap = !matches!(stack.last(), Some(Frame::Union(_)));
                stack.push(Frame::Subquery {
                    nodes: Vec::new(),
                    wrap,
                });
            }
            Token::EndSubquery => match stack.pop() {
                Some(Frame::Subquery { nodes, wrap }) => {
                    if wrap {
                        append(&mut stack, &mut chunk, Node::Group(nodes));
                    } else {
                        for node in nodes {
                            append(&mut stack, &mut chunk, node);
                        }
                    }
                }
                _ => {
                    return Err(Error::UnbalancedTokens(
                        "ENDSUBQUERY closes no open subquery".to_string(),
                    ));
                }
            },
            Token::Union => stack.push(Frame::Union(Vec::new())),
            Token::EndUnion => match stack.pop() {
                Some(Frame::Union(nodes)) => {
                    let unit = Node::Group(vec![Node::Token(Token::Union), Node::Group(nodes)]);
                    append(&mut stack, &mut chunk, unit);
                }
                _ => {
                    return Err(Error::UnbalancedTokens(
                        "ENDUNION closes no open union".to_string(),
                    ));
                }
            },
        }
    }

    if !stack.is_empty() {
        return Err(Error::UnbalancedTokens(format!(
            "{} group(s) left open at end of stream",
            stack.len()
        )));
    }
    if !chunk.is_empty() {
        results.push(chunk);
    }
    Ok(results)
}

/// The deferred invocation form of [`analyze`].
pub async fn analyze_deferred(tokens: &[Token]) -> Result<Vec<Chunk>, Error> {
    analyze(tokens)
}

fn append(stack: &mut [Frame], chunk: &mut Chunk, node: Node) {
    match stack.last_mut() {
        Some(Frame::Group(nodes))
        | Some(Frame::Subquery { nodes, .. })
        | Some(Frame::SubChunk(nodes))
        | Some(Frame::Union(nodes)) => nodes.push(node),
        None => chunk.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_statement::statement::ast::Clause;

    #[test]
    fn unmatched_endgroup_is_rejected() {
        let tokens = vec![
            Token::Identifier(Clause::Where),
            Token::EndGroup(0),
        ];
        let err = analyze(&tokens).unwrap_err();
        assert!(matches!(err, Error::UnbalancedTokens(_)));
    }

    #[test]
    fn dangling_group_is_rejected() {
        let tokens = vec![
            Token::Identifier(Clause::Where),
            Token::Group(0),
            Token::Key("id".to_string()),
        ];
        let err = analyze(&tokens).unwrap_err();
        assert!(matches!(err, Error::UnbalancedTokens(_)));
    }
}
