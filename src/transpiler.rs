//! SQL rendering for query descriptors.
//!
//! Turns a [`QueryDescriptor`] and the schema it was compiled against into
//! a single `SELECT`. Literals are inlined; executors that bind parameters
//! should walk the descriptor themselves.

use std::collections::BTreeSet;

use crate::ast::*;
use crate::schema::{ColumnRef, SchemaDescriptor, Scope};

/// Trait for converting descriptor nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

impl ToSql for ColumnRef {
    fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl ToSql for Condition {
    fn to_sql(&self) -> String {
        match self {
            Condition::Comparison { column, op, value } => match value {
                Operand::List(values) => {
                    let values: Vec<String> = values.iter().map(ToSql::to_sql).collect();
                    format!("{} {} ({})", column, op.sql(), values.join(", "))
                }
                Operand::Single(value) => format!("{} {} {}", column, op.sql(), value),
            },
            Condition::Logical { op, children } => {
                let joiner = match op {
                    LogicalOp::And => " AND ",
                    LogicalOp::Or => " OR ",
                };
                let parts: Vec<String> = children
                    .iter()
                    .map(|child| match child {
                        // Wrap nested groups for correct precedence
                        Condition::Logical { children, .. } if children.len() > 1 => {
                            format!("({})", child.to_sql())
                        }
                        _ => child.to_sql(),
                    })
                    .collect();
                parts.join(joiner)
            }
        }
    }
}

impl ToSql for SortItem {
    fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.direction.sql())
    }
}

impl ToSql for Aggregate {
    fn to_sql(&self) -> String {
        self.to_string()
    }
}

/// A descriptor bound to the schema it was compiled against.
#[derive(Debug, Clone, Copy)]
pub struct SelectStatement<'a> {
    pub descriptor: &'a QueryDescriptor,
    pub schema: &'a SchemaDescriptor,
}

impl<'a> SelectStatement<'a> {
    pub fn new(descriptor: &'a QueryDescriptor, schema: &'a SchemaDescriptor) -> Self {
        Self { descriptor, schema }
    }

    /// Projected columns, excluding aggregates. Relations without a
    /// usable join are left out.
    fn projection(&self) -> Vec<String> {
        let Some(tree) = &self.descriptor.select else {
            return Vec::new();
        };

        let mut cols: Vec<String> = tree
            .columns
            .iter()
            .filter_map(|name| self.schema.column(name))
            .map(ToSql::to_sql)
            .collect();

        for (name, selection) in &tree.relations {
            let Some(relation) = self.schema.relation(name) else {
                continue;
            };
            if self.join_clause(name).is_none() {
                continue;
            }
            match selection {
                RelationSelect::All => cols.push(format!("{}.*", relation.name)),
                RelationSelect::Columns(sub) => cols.extend(
                    sub.columns
                        .iter()
                        .filter_map(|name| relation.column(name))
                        .map(ToSql::to_sql),
                ),
            }
        }

        cols
    }

    /// Relations reached by the projection or the predicate.
    fn joined_relations(&self) -> BTreeSet<&'a str> {
        let descriptor: &'a QueryDescriptor = self.descriptor;
        let mut names = BTreeSet::new();
        if let Some(tree) = &descriptor.select {
            names.extend(tree.relations.keys().map(String::as_str));
        }
        if let Some(filter) = &descriptor.filter {
            names.extend(
                filter
                    .columns()
                    .into_iter()
                    .map(|col| col.table.as_str())
                    .filter(|table| *table != self.schema.table()),
            );
        }
        names
    }

    fn join_clause(&self, name: &str) -> Option<String> {
        let relation = self.schema.relation(name)?;
        let join = relation.join.as_ref()?;
        let local = self.schema.column(&join.local)?;
        let foreign = relation.column(&join.foreign)?;
        Some(format!(
            "LEFT JOIN {} AS {} ON {} = {}",
            relation.table, relation.name, foreign, local
        ))
    }

    fn joins(&self) -> Vec<String> {
        self.joined_relations()
            .into_iter()
            .filter_map(|name| self.join_clause(name))
            .collect()
    }
}

impl ToSql for SelectStatement<'_> {
    fn to_sql(&self) -> String {
        let descriptor = self.descriptor;
        let projection = self.projection();
        let joins = self.joins();
        let aggregates: Vec<String> = descriptor.aggregates.iter().map(ToSql::to_sql).collect();

        let mut sql = String::from("SELECT ");
        let mut cols = projection.clone();
        cols.extend(aggregates.iter().cloned());
        if cols.is_empty() {
            if joins.is_empty() {
                sql.push('*');
            } else {
                sql.push_str(&format!("{}.*", self.schema.table()));
            }
        } else {
            sql.push_str(&cols.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(self.schema.table());

        for join in &joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if let Some(filter) = &descriptor.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.to_sql());
        }

        if !aggregates.is_empty() {
            let group: Vec<&str> = projection
                .iter()
                .map(String::as_str)
                .filter(|c| !c.ends_with(".*"))
                .collect();
            if !group.is_empty() {
                sql.push_str(" GROUP BY ");
                sql.push_str(&group.join(", "));
            }
        }

        if !descriptor.sort.is_empty() {
            let order: Vec<String> = descriptor.sort.iter().map(ToSql::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(n) = descriptor.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        if let Some(n) = descriptor.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }

        sql
    }
}

impl QueryDescriptor {
    /// Render as a `SELECT` against `schema`.
    ///
    /// Relations that declare no join are dropped from the projection. A
    /// filter on such a relation still names its alias in `WHERE`, so the
    /// statement is only runnable once the schema declares the join.
    pub fn to_select_sql(&self, schema: &SchemaDescriptor) -> String {
        SelectStatement::new(self, schema).to_sql()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::QueryParams;
    use crate::parser::{compile, test_schema};
    use crate::schema::RelationSchema;
    use pretty_assertions::assert_eq;

    fn sql(query: &str) -> String {
        let schema = test_schema();
        compile(&QueryParams::parse(query), &schema).to_select_sql(&schema)
    }

    #[test]
    fn test_unrestricted_select() {
        assert_eq!(sql(""), "SELECT * FROM subjects");
    }

    #[test]
    fn test_select_columns() {
        assert_eq!(
            sql("select=id,name,departmentId"),
            "SELECT subjects.department_id, subjects.id, subjects.name FROM subjects"
        );
    }

    #[test]
    fn test_select_relation() {
        assert_eq!(
            sql("select=name,department(name)"),
            "SELECT subjects.name, department.name FROM subjects \
             LEFT JOIN departments AS department ON department.id = subjects.department_id"
        );
        assert_eq!(
            sql("select=department(*)"),
            "SELECT department.* FROM subjects \
             LEFT JOIN departments AS department ON department.id = subjects.department_id"
        );
    }

    #[test]
    fn test_where_precedence() {
        assert_eq!(
            sql("filter=and(id.gt(3),or(name.like('Data%25'),name.is(null)))"),
            "SELECT * FROM subjects WHERE subjects.id > 3 AND \
             (subjects.name LIKE 'Data%' OR subjects.name IS NULL)"
        );
    }

    #[test]
    fn test_list_operators() {
        assert_eq!(
            sql("filter=id.nin(1,'two')"),
            "SELECT * FROM subjects WHERE subjects.id NOT IN (1, 'two')"
        );
    }

    #[test]
    fn test_filter_on_relation_joins() {
        assert_eq!(
            sql("filter=department.description.ilike(%25math%25)"),
            "SELECT subjects.* FROM subjects \
             LEFT JOIN departments AS department ON department.id = subjects.department_id \
             WHERE department.description ILIKE '%math%'"
        );
    }

    #[test]
    fn test_order_limit_offset() {
        assert_eq!(
            sql("sort=-id,name&limit=10&offset=20"),
            "SELECT * FROM subjects ORDER BY subjects.id DESC, subjects.name ASC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(
            sql("aggregate=count"),
            "SELECT COUNT(subjects.id) AS count FROM subjects"
        );
        assert_eq!(
            sql("select=departmentId&aggregate=count"),
            "SELECT subjects.department_id, COUNT(subjects.id) AS count FROM subjects \
             GROUP BY subjects.department_id"
        );
    }

    #[test]
    fn test_relation_without_join_left_out_of_projection() {
        let schema = SchemaDescriptor::builder("subjects")
            .column("id", "id")
            .column("name", "name")
            .relation(RelationSchema::new("department", "departments").column("name", "name"))
            .build()
            .unwrap();
        let descriptor = compile(
            &QueryParams::parse("select=name,department(name),department(*)"),
            &schema,
        );
        assert_eq!(
            descriptor.to_select_sql(&schema),
            "SELECT subjects.name FROM subjects"
        );
    }
}
