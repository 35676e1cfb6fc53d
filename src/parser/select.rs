//! `select` compiler.
//!
//! ```text
//! select := item (',' item)*
//! item   := column
//!         | relation '.' column
//!         | relation '(*)'
//!         | relation '(' select ')'
//! ```

use super::tokens::{self, split_top_level};
use super::Diagnostics;
use crate::ast::{RelationSelect, SelectTree};
use crate::error::Rejection;
use crate::schema::Scope;

/// Compile a select list against `scope`. Unknown names are dropped.
pub fn parse_select(input: &str, scope: &dyn Scope, diag: &mut Diagnostics) -> SelectTree {
    let mut tree = SelectTree::default();
    for item in split_top_level(input) {
        match parse_select_item(item, scope, diag) {
            Ok(Some(fragment)) => tree.merge(fragment),
            Ok(None) => {}
            Err(rejection) => diag.drop_fragment(rejection),
        }
    }
    tree
}

/// One item of a select list, as a tree fragment to merge.
fn parse_select_item(
    item: &str,
    scope: &dyn Scope,
    diag: &mut Diagnostics,
) -> Result<Option<SelectTree>, Rejection> {
    let item = item.trim();
    if item.is_empty() {
        return Ok(None);
    }

    if let Some(call) = tokens::call(item) {
        let [relation] = call.path.as_slice() else {
            return Err(Rejection::unknown(item));
        };
        let selection = parse_relation(relation, call.args, scope, diag)?;
        let mut fragment = SelectTree::default();
        fragment.merge_relation(relation.to_string(), selection);
        return Ok(Some(fragment));
    }

    let path = tokens::path(item).ok_or_else(|| Rejection::malformed(item))?;
    parse_column_path(&path, scope).map(Some)
}

/// `relation(*)` or `relation(sub, select)`.
fn parse_relation(
    name: &str,
    args: &str,
    scope: &dyn Scope,
    diag: &mut Diagnostics,
) -> Result<RelationSelect, Rejection> {
    let relation = scope
        .relation(name)
        .ok_or_else(|| Rejection::unknown(name))?;

    if args.trim() == "*" {
        return Ok(RelationSelect::All);
    }

    let subtree = parse_select(args, relation, diag);
    Ok(RelationSelect::from_tree(subtree))
}

fn parse_column_path(path: &[&str], scope: &dyn Scope) -> Result<SelectTree, Rejection> {
    match path {
        [column] => {
            scope
                .column(column)
                .ok_or_else(|| Rejection::unknown(*column))?;
            Ok(SelectTree::with_columns([*column]))
        }
        [relation, column] => {
            let rel = scope
                .relation(relation)
                .ok_or_else(|| Rejection::unknown(*relation))?;
            rel.column(column)
                .ok_or_else(|| Rejection::unknown(format!("{}.{}", relation, column)))?;
            let mut fragment = SelectTree::default();
            fragment.merge_relation(
                relation.to_string(),
                RelationSelect::Columns(SelectTree::with_columns([*column])),
            );
            Ok(fragment)
        }
        _ => Err(Rejection::unknown(path.join("."))),
    }
}
