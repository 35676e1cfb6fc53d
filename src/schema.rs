//! Entity schemas.
//!
//! A [`SchemaDescriptor`] lists what a client may reference for one entity:
//! its columns, its one-level relations and the columns registered for
//! count aggregates. Descriptors are built once at startup, either through
//! [`SchemaDescriptor::builder`] or from a TOML file via [`SchemaRegistry`],
//! and are shared read-only across requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RelqError, RelqResult};

/// Handle to a concrete SQL column.
///
/// `table` is the name the column is reachable under in a query: the root
/// table for entity columns, the relation name for relation columns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// How a relation joins onto its parent. Both sides are API column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Column on the root entity.
    pub local: String,
    /// Column on the related entity.
    pub foreign: String,
}

/// Name lookups available while compiling one level of a select tree.
pub trait Scope {
    fn column(&self, name: &str) -> Option<&ColumnRef>;

    fn relation(&self, name: &str) -> Option<&RelationSchema>;
}

/// Columns of a related entity, reachable one level from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSchema {
    pub name: String,
    pub table: String,
    pub columns: BTreeMap<String, ColumnRef>,
    pub join: Option<JoinSpec>,
}

impl RelationSchema {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: BTreeMap::new(),
            join: None,
        }
    }

    /// Expose `sql_column` under the API name `name`.
    pub fn column(mut self, name: impl Into<String>, sql_column: impl Into<String>) -> Self {
        let handle = ColumnRef::new(self.name.clone(), sql_column);
        self.columns.insert(name.into(), handle);
        self
    }

    pub fn join(mut self, local: impl Into<String>, foreign: impl Into<String>) -> Self {
        self.join = Some(JoinSpec {
            local: local.into(),
            foreign: foreign.into(),
        });
        self
    }
}

impl Scope for RelationSchema {
    fn column(&self, name: &str) -> Option<&ColumnRef> {
        self.columns.get(name)
    }

    // Relations are one level deep.
    fn relation(&self, _name: &str) -> Option<&RelationSchema> {
        None
    }
}

/// Queryable surface of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    table: String,
    columns: BTreeMap<String, ColumnRef>,
    relations: BTreeMap<String, RelationSchema>,
    aggregates: BTreeMap<String, ColumnRef>,
}

impl SchemaDescriptor {
    pub fn builder(table: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(table)
    }

    /// The root SQL table.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &BTreeMap<String, ColumnRef> {
        &self.columns
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationSchema> {
        &self.relations
    }

    pub fn aggregate(&self, alias: &str) -> Option<&ColumnRef> {
        self.aggregates.get(alias)
    }

    pub fn aggregates(&self) -> &BTreeMap<String, ColumnRef> {
        &self.aggregates
    }
}

impl Scope for SchemaDescriptor {
    fn column(&self, name: &str) -> Option<&ColumnRef> {
        self.columns.get(name)
    }

    fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.get(name)
    }
}

/// Builder for [`SchemaDescriptor`].
#[derive(Debug)]
pub struct SchemaBuilder {
    table: String,
    columns: BTreeMap<String, ColumnRef>,
    relations: BTreeMap<String, RelationSchema>,
    aggregates: Vec<(String, String)>,
}

impl SchemaBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: BTreeMap::new(),
            relations: BTreeMap::new(),
            aggregates: Vec::new(),
        }
    }

    /// Expose `sql_column` of the root table under the API name `name`.
    pub fn column(mut self, name: impl Into<String>, sql_column: impl Into<String>) -> Self {
        let handle = ColumnRef::new(self.table.clone(), sql_column);
        self.columns.insert(name.into(), handle);
        self
    }

    pub fn relation(mut self, relation: RelationSchema) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Register a count aggregate `alias` over the root column `column`.
    pub fn aggregate(mut self, alias: impl Into<String>, column: impl Into<String>) -> Self {
        self.aggregates.push((alias.into(), column.into()));
        self
    }

    /// Validate cross references and build the descriptor.
    pub fn build(self) -> RelqResult<SchemaDescriptor> {
        let mut aggregates = BTreeMap::new();
        for (alias, column) in self.aggregates {
            let handle = self.columns.get(&column).ok_or_else(|| {
                RelqError::schema(format!(
                    "aggregate '{}' on '{}' names unknown column '{}'",
                    alias, self.table, column
                ))
            })?;
            aggregates.insert(alias, handle.clone());
        }

        for relation in self.relations.values() {
            if let Some(join) = &relation.join {
                if !self.columns.contains_key(&join.local) {
                    return Err(RelqError::schema(format!(
                        "relation '{}' joins on unknown column '{}' of '{}'",
                        relation.name, join.local, self.table
                    )));
                }
                if !relation.columns.contains_key(&join.foreign) {
                    return Err(RelqError::schema(format!(
                        "relation '{}' joins on unknown column '{}' of '{}'",
                        relation.name, join.foreign, relation.table
                    )));
                }
            }
        }

        Ok(SchemaDescriptor {
            table: self.table,
            columns: self.columns,
            relations: self.relations,
            aggregates,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    entities: BTreeMap<String, EntityDef>,
}

#[derive(Debug, Deserialize)]
struct EntityDef {
    table: Option<String>,
    #[serde(default)]
    columns: BTreeMap<String, String>,
    #[serde(default)]
    relations: BTreeMap<String, RelationDef>,
    #[serde(default)]
    aggregates: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RelationDef {
    table: String,
    #[serde(default)]
    columns: BTreeMap<String, String>,
    join: Option<JoinSpec>,
}

/// Every entity declared in a schema file, by entity name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, SchemaDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML schema file.
    pub fn load(path: impl AsRef<Path>) -> RelqResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let registry = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded {} entity schemas from {}",
            registry.entities.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_toml_str(content: &str) -> RelqResult<Self> {
        let file: SchemaFile = toml::from_str(content)?;
        let mut registry = Self::new();

        for (name, def) in file.entities {
            let table = def.table.unwrap_or_else(|| name.clone());
            let mut builder = SchemaDescriptor::builder(table);
            for (api, sql) in def.columns {
                builder = builder.column(api, sql);
            }
            for (rel_name, rel) in def.relations {
                let mut relation = RelationSchema::new(rel_name, rel.table);
                for (api, sql) in rel.columns {
                    relation = relation.column(api, sql);
                }
                relation.join = rel.join;
                builder = builder.relation(relation);
            }
            for (alias, column) in def.aggregates {
                builder = builder.aggregate(alias, column);
            }

            let schema = builder.build()?;
            tracing::debug!(
                "Entity '{}': table={}, columns={}, relations={}, aggregates={}",
                name,
                schema.table(),
                schema.columns().len(),
                schema.relations().len(),
                schema.aggregates().len()
            );
            registry.entities.insert(name, schema);
        }

        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: SchemaDescriptor) {
        self.entities.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaDescriptor> {
        self.entities.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// `<config dir>/relq/schema.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relq").join("schema.toml"))
    }
}
