//! Query descriptor types.
//!
//! These are the structures the compiler produces from a query string.
//! Every value is built once per request and never mutated afterwards;
//! [`QueryDescriptor`] is the only thing handed to an executor.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::schema::ColumnRef;

/// A coerced literal from a filter value list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Comparison operators accepted in `column.op(values)` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Is,
    Like,
    Ilike,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::Nin,
        Operator::Is,
        Operator::Like,
        Operator::Ilike,
    ];

    /// Look up an operator by its query-string name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// The query-string spelling.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Is => "is",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
        }
    }

    /// Whether the operator consumes the whole value list.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }

    /// The SQL spelling.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::Nin => "NOT IN",
            Operator::Is => "IS",
            Operator::Like => "LIKE",
            Operator::Ilike => "ILIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "and" => Some(LogicalOp::And),
            "or" => Some(LogicalOp::Or),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Single(Value),
    List(Vec<Value>),
}

/// A node of the predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Condition {
    Comparison {
        column: ColumnRef,
        op: Operator,
        value: Operand,
    },
    Logical {
        op: LogicalOp,
        children: Vec<Condition>,
    },
}

impl Condition {
    pub fn comparison(column: ColumnRef, op: Operator, value: Operand) -> Self {
        Condition::Comparison { column, op, value }
    }

    /// Combine resolved children. A combinator with no children is absent.
    pub fn logical(op: LogicalOp, children: Vec<Condition>) -> Option<Self> {
        if children.is_empty() {
            None
        } else {
            Some(Condition::Logical { op, children })
        }
    }

    /// Visit every column referenced by this tree, depth first.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Condition::Comparison { column, .. } => out.push(column),
            Condition::Logical { children, .. } => {
                for child in children {
                    child.collect_columns(out);
                }
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Comparison { column, op, value } => {
                write!(f, "{}.{}(", column, op)?;
                match value {
                    Operand::Single(v) => write!(f, "{}", v)?,
                    Operand::List(values) => {
                        for (i, v) in values.iter().enumerate() {
                            if i > 0 {
                                f.write_str(",")?;
                            }
                            write!(f, "{}", v)?;
                        }
                    }
                }
                f.write_str(")")
            }
            Condition::Logical { op, children } => {
                write!(f, "{}(", op)?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Projection tree over an entity and its relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectTree {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub columns: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, RelationSelect>,
}

impl SelectTree {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.relations.is_empty()
    }

    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            relations: BTreeMap::new(),
        }
    }

    /// Union `other` into `self`. Nothing already selected is lost.
    pub fn merge(&mut self, other: SelectTree) {
        self.columns.extend(other.columns);
        for (name, selection) in other.relations {
            self.merge_relation(name, selection);
        }
    }

    pub fn merge_relation(&mut self, name: String, selection: RelationSelect) {
        match self.relations.remove(&name) {
            Some(existing) => {
                self.relations.insert(name, existing.merge(selection));
            }
            None => {
                self.relations.insert(name, selection);
            }
        }
    }
}

/// What to include from a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationSelect {
    /// The whole relation, unrestricted. Serialized as `true`.
    All,
    Columns(SelectTree),
}

impl RelationSelect {
    /// Wrap a subtree, collapsing an empty one to [`RelationSelect::All`].
    pub fn from_tree(tree: SelectTree) -> Self {
        if tree.is_empty() {
            RelationSelect::All
        } else {
            RelationSelect::Columns(tree)
        }
    }

    pub fn merge(self, other: RelationSelect) -> RelationSelect {
        match (self, other) {
            (RelationSelect::Columns(mut a), RelationSelect::Columns(b)) => {
                a.merge(b);
                RelationSelect::Columns(a)
            }
            _ => RelationSelect::All,
        }
    }
}

impl Serialize for RelationSelect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationSelect::All => serializer.serialize_bool(true),
            RelationSelect::Columns(tree) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("columns", &tree.columns)?;
                if !tree.relations.is_empty() {
                    map.serialize_entry("relations", &tree.relations)?;
                }
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One ordering term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortItem {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

impl SortItem {
    pub fn asc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunc {
    Count,
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunc::Count => write!(f, "COUNT"),
        }
    }
}

/// A named aggregate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub alias: String,
    pub func: AggregateFunc,
    pub column: ColumnRef,
}

impl Aggregate {
    pub fn count(alias: impl Into<String>, column: ColumnRef) -> Self {
        Self {
            alias: alias.into(),
            func: AggregateFunc::Count,
            column,
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) AS {}", self.func, self.column, self.alias)
    }
}

/// Everything a query string asked for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectTree>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Condition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aggregates: Vec<Aggregate>,
}

impl QueryDescriptor {
    pub fn is_empty(&self) -> bool {
        self.select.is_none()
            && self.filter.is_none()
            && self.sort.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
            && self.aggregates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> ColumnRef {
        ColumnRef::new("subjects", name)
    }

    #[test]
    fn test_operator_lookup() {
        assert_eq!(Operator::from_name("gte"), Some(Operator::Gte));
        assert_eq!(Operator::from_name("nin"), Some(Operator::Nin));
        assert_eq!(Operator::from_name("not"), None);
        assert!(Operator::In.takes_list());
        assert!(!Operator::Like.takes_list());
    }

    #[test]
    fn test_value_display_escapes_quotes() {
        assert_eq!(Value::from("O'Brien").to_string(), "'O''Brien'");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_empty_logical_is_absent() {
        assert_eq!(Condition::logical(LogicalOp::Or, vec![]), None);
        let eq = Condition::comparison(col("id"), Operator::Eq, Operand::Single(Value::Int(1)));
        let and = Condition::logical(LogicalOp::And, vec![eq.clone()]).unwrap();
        assert_eq!(and.to_string(), "and(subjects.id.eq(1))");
        assert_eq!(and.columns(), vec![&col("id")]);
    }

    #[test]
    fn test_merge_unions_columns() {
        let mut a = SelectTree::with_columns(["id"]);
        a.merge_relation(
            "department".into(),
            RelationSelect::Columns(SelectTree::with_columns(["name"])),
        );
        let mut b = SelectTree::with_columns(["name"]);
        b.merge_relation(
            "department".into(),
            RelationSelect::Columns(SelectTree::with_columns(["id"])),
        );
        a.merge(b);

        assert_eq!(a.columns, SelectTree::with_columns(["id", "name"]).columns);
        assert_eq!(
            a.relations["department"],
            RelationSelect::Columns(SelectTree::with_columns(["id", "name"]))
        );
    }

    #[test]
    fn test_whole_relation_absorbs_columns() {
        let cols = RelationSelect::Columns(SelectTree::with_columns(["id"]));
        assert_eq!(cols.clone().merge(RelationSelect::All), RelationSelect::All);
        assert_eq!(RelationSelect::All.merge(cols), RelationSelect::All);
        assert_eq!(
            RelationSelect::from_tree(SelectTree::default()),
            RelationSelect::All
        );
    }

    #[test]
    fn test_descriptor_json() {
        let mut select = SelectTree::with_columns(["id"]);
        select.merge_relation("department".into(), RelationSelect::All);
        let descriptor = QueryDescriptor {
            select: Some(select),
            limit: Some(5),
            ..Default::default()
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "select": { "columns": ["id"], "relations": { "department": true } },
                "limit": 5
            })
        );
        assert!(QueryDescriptor::default().is_empty());
    }
}
