//! `aggregate` compiler: `alias (',' alias)*`.

use super::tokens::split_top_level;
use super::Diagnostics;
use crate::ast::Aggregate;
use crate::error::Rejection;
use crate::schema::SchemaDescriptor;

/// Compile a list of aggregate aliases into count aggregates.
pub fn parse_aggregates(
    input: &str,
    schema: &SchemaDescriptor,
    diag: &mut Diagnostics,
) -> Vec<Aggregate> {
    split_top_level(input)
        .into_iter()
        .map(str::trim)
        .filter(|alias| !alias.is_empty())
        .filter_map(|alias| match schema.aggregate(alias) {
            Some(column) => Some(Aggregate::count(alias, column.clone())),
            None => {
                diag.drop_fragment(Rejection::unknown(alias));
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_schema;
    use crate::schema::ColumnRef;

    #[test]
    fn test_known_alias() {
        let schema = test_schema();
        let mut diag = Diagnostics::new("aggregate");
        let aggregates = parse_aggregates("count", &schema, &mut diag);
        assert_eq!(
            aggregates,
            vec![Aggregate::count("count", ColumnRef::new("subjects", "id"))]
        );
        assert_eq!(aggregates[0].to_string(), "COUNT(subjects.id) AS count");
    }

    #[test]
    fn test_unknown_alias_dropped() {
        let schema = test_schema();
        let mut diag = Diagnostics::new("aggregate");
        let aggregates = parse_aggregates("sum, departments ,count", &schema, &mut diag);
        assert_eq!(
            aggregates.iter().map(|a| a.alias.as_str()).collect::<Vec<_>>(),
            vec!["departments", "count"]
        );
        assert_eq!(diag.into_rejections(), vec![Rejection::unknown("sum")]);
    }
}
