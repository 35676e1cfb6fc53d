//! `sort` compiler.
//!
//! ```text
//! sort := item (',' item)*
//! item := ['-'] path | path '.' ('asc' | 'desc')
//! ```

use super::tokens::{self, split_top_level};
use super::Diagnostics;
use crate::ast::{SortDirection, SortItem};
use crate::error::Rejection;
use crate::schema::{SchemaDescriptor, Scope};

/// Compile a sort list. Client order and duplicates are preserved.
pub fn parse_sort(input: &str, schema: &SchemaDescriptor, diag: &mut Diagnostics) -> Vec<SortItem> {
    let mut items = Vec::new();
    for item in split_top_level(input) {
        match parse_sort_item(item, schema) {
            Ok(Some(sort)) => items.push(sort),
            Ok(None) => {}
            Err(rejection) => diag.drop_fragment(rejection),
        }
    }
    items
}

fn parse_sort_item(item: &str, schema: &SchemaDescriptor) -> Result<Option<SortItem>, Rejection> {
    let item = item.trim();
    if item.is_empty() {
        return Ok(None);
    }

    let (direction, mut path) = match item.strip_prefix('-') {
        Some(rest) => {
            let path = tokens::path(rest).ok_or_else(|| Rejection::malformed(item))?;
            (SortDirection::Desc, path)
        }
        None => {
            let mut path = tokens::path(item).ok_or_else(|| Rejection::malformed(item))?;
            let direction = match path.last().copied() {
                Some("asc") => Some(SortDirection::Asc),
                Some("desc") => Some(SortDirection::Desc),
                _ => None,
            };
            if direction.is_some() {
                path.pop();
            }
            (direction.unwrap_or(SortDirection::Asc), path)
        }
    };

    // Only the last segment is resolved; relation prefixes are informational.
    let name = path.pop().ok_or_else(|| Rejection::malformed(item))?;
    let column = schema
        .column(name)
        .ok_or_else(|| Rejection::unknown(name))?;

    Ok(Some(SortItem {
        column: column.clone(),
        direction,
    }))
}
