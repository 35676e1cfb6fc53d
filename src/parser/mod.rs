//! Query-string compiler.
//!
//! Turns the raw `select`, `filter`, `sort`, `limit`, `offset` and
//! `aggregate` parameters into a [`QueryDescriptor`].
//!
//! ```text
//! ?select=id,department(name)&filter=and(id.gt(3),name.like(Data%))&sort=-id&limit=10
//!  ───┬─────────────────────── ──────────────┬───────────────────── ───┬──── ───┬────
//!     │                                      │                          │       │
//!     │                                      │                          │       └── pagination
//!     │                                      │                          └── ordering
//!     │                                      └── predicate tree
//!     └── projection tree
//! ```
//!
//! Each parameter is compiled independently. Fragments that do not resolve
//! are dropped and recorded as [`Rejection`]s; compiling never fails.

pub mod aggregate;
pub mod filter;
pub mod select;
pub mod sort;
pub mod tokens;

use crate::ast::{Aggregate, Condition, LogicalOp, QueryDescriptor, SelectTree, SortItem};
use crate::error::Rejection;
use crate::params::{ParamValue, QueryParams};
use crate::schema::SchemaDescriptor;

pub use aggregate::parse_aggregates;
pub use filter::parse_filter;
pub use select::parse_select;
pub use sort::parse_sort;
pub use tokens::{coerce, split_top_level};

/// Collects the fragments dropped while compiling one parameter.
#[derive(Debug)]
pub struct Diagnostics {
    param: &'static str,
    rejections: Vec<Rejection>,
}

impl Diagnostics {
    pub fn new(param: &'static str) -> Self {
        Self {
            param,
            rejections: Vec::new(),
        }
    }

    /// Record a dropped fragment.
    pub fn drop_fragment(&mut self, rejection: Rejection) {
        tracing::debug!(param = self.param, %rejection, "dropped query fragment");
        self.rejections.push(rejection);
    }

    /// Continue collecting under another parameter name.
    fn switch(&mut self, param: &'static str) {
        self.param = param;
    }

    pub fn into_rejections(self) -> Vec<Rejection> {
        self.rejections
    }
}

/// A compiled descriptor plus everything that was dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub descriptor: QueryDescriptor,
    pub rejections: Vec<Rejection>,
}

/// Compiles query parameters against one entity schema.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'s> {
    schema: &'s SchemaDescriptor,
}

impl<'s> Compiler<'s> {
    pub fn new(schema: &'s SchemaDescriptor) -> Self {
        Self { schema }
    }

    pub fn compile(&self, params: &QueryParams) -> QueryDescriptor {
        self.compile_report(params).descriptor
    }

    pub fn compile_report(&self, params: &QueryParams) -> Compiled {
        tracing::trace!(table = self.schema.table(), "compiling query parameters");
        let mut diag = Diagnostics::new("select");

        let select = params.get("select").and_then(|value| {
            diag.switch("select");
            self.select(value, &mut diag)
        });
        let filter = params.get("filter").and_then(|value| {
            diag.switch("filter");
            self.filter(value, &mut diag)
        });
        let sort: Vec<SortItem> = params
            .get("sort")
            .map(|value| {
                diag.switch("sort");
                value
                    .fragments()
                    .into_iter()
                    .flat_map(|fragment| parse_sort(fragment, self.schema, &mut diag))
                    .collect()
            })
            .unwrap_or_default();
        let limit = params.get("limit").and_then(|value| {
            diag.switch("limit");
            parse_pagination(value, &mut diag)
        });
        let offset = params.get("offset").and_then(|value| {
            diag.switch("offset");
            parse_pagination(value, &mut diag)
        });
        let aggregates: Vec<Aggregate> = params
            .get("aggregate")
            .map(|value| {
                diag.switch("aggregate");
                value
                    .fragments()
                    .into_iter()
                    .flat_map(|fragment| parse_aggregates(fragment, self.schema, &mut diag))
                    .collect()
            })
            .unwrap_or_default();

        let descriptor = QueryDescriptor {
            select,
            filter,
            sort,
            limit,
            offset,
            aggregates,
        };
        let rejections = diag.into_rejections();
        tracing::trace!(dropped = rejections.len(), "compiled query descriptor");

        Compiled {
            descriptor,
            rejections,
        }
    }

    /// Every fragment merges into one tree; an empty tree is no projection.
    fn select(&self, value: &ParamValue, diag: &mut Diagnostics) -> Option<SelectTree> {
        let mut tree = SelectTree::default();
        for fragment in value.fragments() {
            tree.merge(parse_select(fragment, self.schema, diag));
        }
        (!tree.is_empty()).then_some(tree)
    }

    /// Several filter fragments are joined under an implicit `and`.
    fn filter(&self, value: &ParamValue, diag: &mut Diagnostics) -> Option<Condition> {
        let mut roots: Vec<Condition> = value
            .fragments()
            .into_iter()
            .filter_map(|fragment| parse_filter(fragment, self.schema, diag))
            .collect();

        if roots.len() == 1 {
            roots.pop()
        } else {
            Condition::logical(LogicalOp::And, roots)
        }
    }
}

/// A non-negative integer, given as integer or integral numeric text.
pub fn parse_pagination(value: &ParamValue, diag: &mut Diagnostics) -> Option<u64> {
    let raw = match value {
        ParamValue::Single(raw) => raw.trim(),
        ParamValue::List(items) => {
            diag.drop_fragment(Rejection::InvalidValue(items.join(",")));
            return None;
        }
    };

    let parsed = raw.parse::<u64>().ok().or_else(|| match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n < u64::MAX as f64 => {
            Some(n as u64)
        }
        _ => None,
    });

    if parsed.is_none() {
        diag.drop_fragment(Rejection::InvalidValue(raw.to_string()));
    }
    parsed
}

/// Compile `params` against `schema`.
pub fn compile(params: &QueryParams, schema: &SchemaDescriptor) -> QueryDescriptor {
    Compiler::new(schema).compile(params)
}

/// Compile `params` against `schema`, keeping the dropped fragments.
pub fn compile_report(params: &QueryParams, schema: &SchemaDescriptor) -> Compiled {
    Compiler::new(schema).compile_report(params)
}

#[cfg(test)]
pub(crate) fn test_schema() -> SchemaDescriptor {
    use crate::schema::RelationSchema;

    SchemaDescriptor::builder("subjects")
        .column("id", "id")
        .column("name", "name")
        .column("departmentId", "department_id")
        .relation(
            RelationSchema::new("department", "departments")
                .column("id", "id")
                .column("name", "name")
                .column("description", "description")
                .join("departmentId", "id"),
        )
        .aggregate("count", "id")
        .aggregate("departments", "departmentId")
        .build()
        .expect("test schema is valid")
}
