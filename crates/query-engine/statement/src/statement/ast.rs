//! Type definitions of the engine-agnostic statement representation.
//!
//! A statement is the flattened, compiled form of a declarative query:
//! the thing a driver renders into a native query (SQL text, a document
//! store query object, ...). Statements are built by the compiler crate
//! and never execute anything themselves.

use indexmap::IndexMap;

/// Scalar values carried through criteria and statements.
pub type Value = serde_json::Value;

/// A compiled, flat query statement.
///
/// Exactly one "method shape" is populated at a time: `select`/`from` for
/// reads, `insert`/`into` for creates, `update`/`using` for updates,
/// `del`/`from` for deletes, `count`/`from` for counts. Aggregations
/// (`avg`/`max`/`min`/`sum`) replace the select list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub select: Option<Vec<String>>,
    pub from: Option<From>,
    pub where_: Option<Predicate>,
    pub order_by: Option<Vec<OrderByElement>>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub left_outer_join: Vec<JoinOn>,
    pub insert: Option<IndexMap<String, Value>>,
    pub into: Option<String>,
    pub update: Option<IndexMap<String, Value>>,
    pub using: Option<String>,
    pub del: bool,
    pub count: bool,
    pub avg: Option<String>,
    pub max: Option<String>,
    pub min: Option<String>,
    pub sum: Option<String>,
    pub group_by: Option<String>,
    pub returning: Option<Returning>,
    /// Statements combined with UNION ALL semantics, e.g. the per-parent
    /// branches of a paginated association query.
    pub union_all: Vec<Statement>,
    pub opts: Option<Opts>,
}

/// Pass-through options attached to a statement for the driver.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Opts {
    pub schema: String,
}

/// A FROM clause: either a plain table or a derived subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum From {
    Table(String),
    /// A derived table, e.g. the paginated inner query an AVG
    /// aggregation is computed over.
    Subquery {
        statement: Box<Statement>,
        alias: String,
    },
}

/// A RETURNING clause: one column or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returning {
    Column(String),
    Columns(Vec<String>),
}

/// One LEFT OUTER JOIN edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOn {
    pub from: String,
    pub on: JoinKeys,
}

/// The equi-join condition of a join edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeys {
    pub parent: String,
    pub parent_key: String,
    pub child: String,
    pub child_key: String,
}

/// A single element of an ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByElement {
    pub column: String,
    pub direction: SortDirection,
}

/// A direction for a single ORDER BY element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A normalized predicate tree.
///
/// Statement-level `where` clauses always carry an explicit `And` or `Or`
/// at the top. `Conjunction` is the implicit form: sibling attribute
/// constraints that belong to the same branch without a combinator marker
/// of their own (they tokenize flat, with no grouping).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Implicit conjunction of sibling constraints.
    Conjunction(Vec<Predicate>),
    /// An explicit AND combinator over branches.
    And(Vec<Predicate>),
    /// An explicit OR combinator over branches.
    Or(Vec<Predicate>),
    /// A negated sub-predicate.
    Not(Box<Predicate>),
    /// A single attribute constraint.
    Leaf {
        attribute: String,
        constraint: Constraint,
    },
}

/// The constraint applied to one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Equals(Value),
    NotEquals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// One or more comparison/like operators, in declaration order.
    /// Order matters: multi-operator leaves must tokenize
    /// deterministically.
    Compare(Vec<(Operator, Value)>),
}

/// A comparison operator on a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GreaterThan,
    LessThan,
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
    Like,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterThanOrEqualTo => ">=",
            Operator::LessThanOrEqualTo => "<=",
            Operator::Like => "like",
        }
    }

    /// Parse the symbolic form. Spelled-out synonyms (`greaterThan`, ...)
    /// are criteria-level sugar and are rewritten before this is reached.
    pub fn from_str(s: &str) -> Option<Operator> {
        match s {
            ">" => Some(Operator::GreaterThan),
            "<" => Some(Operator::LessThan),
            ">=" => Some(Operator::GreaterThanOrEqualTo),
            "<=" => Some(Operator::LessThanOrEqualTo),
            "like" => Some(Operator::Like),
            _ => None,
        }
    }
}

/// A single token in the flattened statement stream.
///
/// Every opening token has exactly one matching closing token; the stream
/// is stack-balanced. `Group` indices number the sibling branches of a
/// combinator and are unique within their nesting level.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(Clause),
    EndIdentifier(Clause),
    Key(String),
    Value(Value),
    Operator(Operator),
    EndOperator(Operator),
    Condition(Condition),
    EndCondition(Condition),
    Group(usize),
    EndGroup(usize),
    Union,
    EndUnion,
    Subquery,
    EndSubquery,
}

/// Top-level clause markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Select,
    From,
    Where,
    Insert,
    Into,
    Update,
    Using,
    Delete,
    Count,
    Skip,
    Limit,
    GroupBy,
    OrderBy,
    Min,
    Max,
    Sum,
    Avg,
    Returning,
}

impl Clause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Clause::Select => "SELECT",
            Clause::From => "FROM",
            Clause::Where => "WHERE",
            Clause::Insert => "INSERT",
            Clause::Into => "INTO",
            Clause::Update => "UPDATE",
            Clause::Using => "USING",
            Clause::Delete => "DELETE",
            Clause::Count => "COUNT",
            Clause::Skip => "SKIP",
            Clause::Limit => "LIMIT",
            Clause::GroupBy => "GROUPBY",
            Clause::OrderBy => "ORDERBY",
            Clause::Min => "MIN",
            Clause::Max => "MAX",
            Clause::Sum => "SUM",
            Clause::Avg => "AVG",
            Clause::Returning => "RETURNING",
        }
    }
}

/// Logical condition markers inside a WHERE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    And,
    Or,
    Not,
    In,
    NotIn,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::And => "AND",
            Condition::Or => "OR",
            Condition::Not => "NOT",
            Condition::In => "IN",
            Condition::NotIn => "NOTIN",
        }
    }
}
