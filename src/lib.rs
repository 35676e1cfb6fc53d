//! # relq
//!
//! Compile REST query strings into relational query descriptors.
//!
//! relq lets an HTTP client describe projection, filtering, sorting,
//! pagination and count aggregates through a handful of query parameters,
//! checked against a per-entity schema.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use relq::prelude::*;
//!
//! let schema = SchemaDescriptor::builder("subjects")
//!     .column("id", "id")
//!     .column("name", "name")
//!     .build()?;
//!
//! let query = relq::compile_query_string(
//!     "select=id,name&filter=or(id.eq(1),name.like(Data%25))&sort=-id&limit=10",
//!     &schema,
//! );
//! let sql = query.to_select_sql(&schema);
//! // => "SELECT subjects.id, subjects.name FROM subjects
//! //     WHERE subjects.id = 1 OR subjects.name LIKE 'Data%'
//! //     ORDER BY subjects.id DESC LIMIT 10"
//! ```
//!
//! ## Parameters
//!
//! | Key         | Example                              | Produces         |
//! |-------------|--------------------------------------|------------------|
//! | `select`    | `id,department(id,name)`             | projection tree  |
//! | `filter`    | `and(id.gt(3),name.ilike('%data%'))` | predicate tree   |
//! | `sort`      | `-id,name.desc`                      | ordering list    |
//! | `limit`     | `10`                                 | row cap          |
//! | `offset`    | `20`                                 | row skip         |
//! | `aggregate` | `count`                              | count aggregates |
//!
//! Anything that does not resolve against the schema is dropped rather
//! than reported as an error.

pub mod ast;
pub mod error;
pub mod params;
pub mod parser;
pub mod schema;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::error::*;
    pub use crate::params::{ParamValue, QueryParams};
    pub use crate::parser::{compile, compile_report, Compiled, Compiler};
    pub use crate::schema::{ColumnRef, RelationSchema, SchemaDescriptor, SchemaRegistry, Scope};
    pub use crate::transpiler::{SelectStatement, ToSql};
}

pub use parser::{compile, compile_report, Compiled, Compiler};

/// Decode a raw URL query string and compile it against `schema`.
///
/// # Example
///
/// ```
/// use relq::schema::SchemaDescriptor;
///
/// let schema = SchemaDescriptor::builder("users")
///     .column("id", "id")
///     .build()
///     .unwrap();
/// let query = relq::compile_query_string("select=id,password&limit=5", &schema);
/// assert_eq!(query.select.unwrap().columns.len(), 1);
/// assert_eq!(query.limit, Some(5));
/// ```
pub fn compile_query_string(raw: &str, schema: &schema::SchemaDescriptor) -> ast::QueryDescriptor {
    parser::compile(&params::QueryParams::parse(raw), schema)
}
