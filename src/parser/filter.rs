//! `filter` compiler.
//!
//! ```text
//! filter     := logical | comparison
//! logical    := ('and' | 'or') '(' filter (',' filter)* ')'
//! comparison := [relation '.'] column '.' operator '(' value (',' value)* ')'
//! ```
//!
//! Any sub-expression that cannot be resolved is dropped. A combinator whose
//! children were all dropped is itself dropped, up to the root.

use super::tokens::{self, coerce, split_top_level};
use super::Diagnostics;
use crate::ast::{Condition, LogicalOp, Operand, Operator};
use crate::error::Rejection;
use crate::schema::{ColumnRef, SchemaDescriptor, Scope};

/// Combinators nested deeper than this are dropped as malformed.
pub const MAX_DEPTH: usize = 64;

/// Compile one filter expression. `None` when nothing resolved.
pub fn parse_filter(
    input: &str,
    schema: &SchemaDescriptor,
    diag: &mut Diagnostics,
) -> Option<Condition> {
    parse_nested(input, schema, diag, 0)
}

fn parse_nested(
    input: &str,
    schema: &SchemaDescriptor,
    diag: &mut Diagnostics,
    depth: usize,
) -> Option<Condition> {
    match parse_expr(input, schema, diag, depth) {
        Ok(condition) => condition,
        Err(rejection) => {
            diag.drop_fragment(rejection);
            None
        }
    }
}

fn parse_expr(
    input: &str,
    schema: &SchemaDescriptor,
    diag: &mut Diagnostics,
    depth: usize,
) -> Result<Option<Condition>, Rejection> {
    let token = input.trim();
    if depth > MAX_DEPTH {
        return Err(Rejection::malformed(token));
    }
    let call = tokens::call(token).ok_or_else(|| Rejection::malformed(token))?;

    match call.path.as_slice() {
        [name] => {
            let op = LogicalOp::from_name(name).ok_or_else(|| Rejection::malformed(token))?;
            parse_logical(op, token, call.args, schema, diag, depth)
        }
        [column @ .., operator] => {
            parse_comparison(column, operator, call.args, schema).map(Some)
        }
        [] => Err(Rejection::malformed(token)),
    }
}

/// Empty argument slots are skipped; a combinator with none at all is malformed.
fn parse_logical(
    op: LogicalOp,
    token: &str,
    args: &str,
    schema: &SchemaDescriptor,
    diag: &mut Diagnostics,
    depth: usize,
) -> Result<Option<Condition>, Rejection> {
    let items: Vec<&str> = split_top_level(args)
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .collect();
    if items.is_empty() {
        return Err(Rejection::malformed(token));
    }

    let children = items
        .into_iter()
        .filter_map(|item| parse_nested(item, schema, diag, depth + 1))
        .collect();
    Ok(Condition::logical(op, children))
}

fn parse_comparison(
    path: &[&str],
    operator: &str,
    args: &str,
    schema: &SchemaDescriptor,
) -> Result<Condition, Rejection> {
    let column = resolve_column(path, schema)?.clone();
    let op = Operator::from_name(operator)
        .ok_or_else(|| Rejection::UnsupportedOperator(operator.to_string()))?;

    // split_top_level always yields at least one segment
    let mut values: Vec<_> = split_top_level(args).into_iter().map(coerce).collect();
    let value = if op.takes_list() {
        Operand::List(values)
    } else {
        Operand::Single(values.swap_remove(0))
    };

    Ok(Condition::comparison(column, op, value))
}

/// Root columns win; a relation-qualified path falls back to the
/// relation's own columns.
fn resolve_column<'s>(path: &[&str], schema: &'s SchemaDescriptor) -> Result<&'s ColumnRef, Rejection> {
    let (name, relation) = match path {
        [name] => (*name, None),
        [relation, name] => (*name, Some(*relation)),
        _ => return Err(Rejection::malformed(path.join("."))),
    };

    schema
        .column(name)
        .or_else(|| {
            relation
                .and_then(|rel| schema.relation(rel))
                .and_then(|rel| rel.column(name))
        })
        .ok_or_else(|| Rejection::unknown(path.join(".")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;
    use crate::parser::test_schema;
    use pretty_assertions::assert_eq;

    fn filter(input: &str) -> (Option<Condition>, Vec<Rejection>) {
        let schema = test_schema();
        let mut diag = Diagnostics::new("filter");
        let condition = parse_filter(input, &schema, &mut diag);
        (condition, diag.into_rejections())
    }

    fn subjects(column: &str) -> ColumnRef {
        ColumnRef::new("subjects", column)
    }

    fn eq(column: ColumnRef, value: Value) -> Condition {
        Condition::comparison(column, Operator::Eq, Operand::Single(value))
    }

    #[test]
    fn test_simple_comparison() {
        let (condition, _) = filter("id.eq(1)");
        assert_eq!(condition, Some(eq(subjects("id"), Value::Int(1))));
    }

    #[test]
    fn test_missing_path_is_absent() {
        let (condition, rejections) = filter("eq(id,1)");
        assert_eq!(condition, None);
        assert_eq!(rejections, vec![Rejection::malformed("eq(id,1)")]);
    }

    #[test]
    fn test_and_keeps_resolved_children() {
        let (condition, _) = filter("and(id.eq(1),name.like(foo))");
        assert_eq!(
            condition,
            Some(Condition::Logical {
                op: LogicalOp::And,
                children: vec![
                    eq(subjects("id"), Value::Int(1)),
                    Condition::comparison(
                        subjects("name"),
                        Operator::Like,
                        Operand::Single(Value::String("foo".into()))
                    ),
                ],
            })
        );
    }

    #[test]
    fn test_unknown_child_is_dropped() {
        let (condition, rejections) = filter("and(id.eq(1),bogus.eq(2))");
        assert_eq!(
            condition,
            Some(Condition::Logical {
                op: LogicalOp::And,
                children: vec![eq(subjects("id"), Value::Int(1))],
            })
        );
        assert_eq!(rejections, vec![Rejection::unknown("bogus")]);
    }

    #[test]
    fn test_all_children_dropped_propagates() {
        let (condition, rejections) = filter("or(and(bogus.eq(1)),id.between(1,2))");
        assert_eq!(condition, None);
        assert_eq!(
            rejections,
            vec![
                Rejection::unknown("bogus"),
                Rejection::UnsupportedOperator("between".into()),
            ]
        );
    }

    #[test]
    fn test_nested_logical() {
        let (condition, _) = filter("or(id.eq(1),and(name.eq('x'),departmentId.gt(2)))");
        let Some(Condition::Logical { op, children }) = condition else {
            panic!("expected logical node");
        };
        assert_eq!(op, LogicalOp::Or);
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[1],
            Condition::Logical {
                op: LogicalOp::And,
                children: vec![
                    eq(subjects("name"), Value::String("x".into())),
                    Condition::comparison(
                        subjects("department_id"),
                        Operator::Gt,
                        Operand::Single(Value::Int(2))
                    ),
                ],
            }
        );
    }

    #[test]
    fn test_list_operators_take_all_values() {
        let (condition, _) = filter("id.in(1,2,3)");
        assert_eq!(
            condition,
            Some(Condition::comparison(
                subjects("id"),
                Operator::In,
                Operand::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
            ))
        );

        let (condition, _) = filter("id.nin()");
        assert_eq!(
            condition,
            Some(Condition::comparison(
                subjects("id"),
                Operator::Nin,
                Operand::List(vec![Value::String(String::new())])
            ))
        );
    }

    #[test]
    fn test_scalar_operators_take_first_value() {
        let (condition, _) = filter("name.is(null, true)");
        assert_eq!(
            condition,
            Some(Condition::comparison(
                subjects("name"),
                Operator::Is,
                Operand::Single(Value::Null)
            ))
        );
    }

    #[test]
    fn test_relation_column_resolution() {
        // `description` only exists on the relation
        let (condition, _) = filter("department.description.ilike('%math%')");
        assert_eq!(
            condition,
            Some(Condition::comparison(
                ColumnRef::new("department", "description"),
                Operator::Ilike,
                Operand::Single(Value::String("%math%".into()))
            ))
        );

        // root columns are checked first
        let (condition, _) = filter("department.name.eq(Physics)");
        assert_eq!(
            condition,
            Some(eq(subjects("name"), Value::String("Physics".into())))
        );
    }

    #[test]
    fn test_malformed_shapes() {
        for input in ["", "id.eq", "id.eq(1", "not(id.eq(1))", "a.b.c.eq(1)", "id.eq(1),id.eq(2)"] {
            let (condition, rejections) = filter(input);
            assert_eq!(condition, None, "{input}");
            assert_eq!(rejections.len(), 1, "{input}");
        }
    }

    #[test]
    fn test_empty_combinator_slots() {
        let (condition, rejections) = filter("or(id.eq(1),)");
        assert_eq!(
            condition,
            Some(Condition::Logical {
                op: LogicalOp::Or,
                children: vec![eq(subjects("id"), Value::Int(1))],
            })
        );
        assert!(rejections.is_empty());

        let (condition, rejections) = filter("and( )");
        assert_eq!(condition, None);
        assert_eq!(rejections, vec![Rejection::malformed("and( )")]);
    }

    #[test]
    fn test_nesting_within_limit() {
        let depth = MAX_DEPTH;
        let input = format!("{}id.eq(1){}", "and(".repeat(depth), ")".repeat(depth));
        let (condition, rejections) = filter(&input);
        assert!(condition.is_some());
        assert!(rejections.is_empty());
    }

    #[test]
    fn test_deep_nesting_is_dropped() {
        let depth = 10_000;
        let input = format!("{}id.eq(1){}", "and(".repeat(depth), ")".repeat(depth));
        let (condition, rejections) = filter(&input);
        assert_eq!(condition, None);
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].kind(), "malformed");
    }
}
