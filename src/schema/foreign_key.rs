//! Lookup (foreign key) bindings.
//!
//! A `ForeignKey` is a lazy binding from a source column to a target virtual
//! table and column. Resolution of the target table is deferred to first use
//! and cached; composing the lookup into a larger query remaps its field
//! keys, with an identity shortcut that avoids cloning when nothing moves.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{GridResult, SchemaError};
use crate::query::filter::SimpleFilter;
use crate::schema::field_key::FieldKey;
use crate::schema::table::TableInfo;

/// Supplies the target table of a lookup on demand.
pub trait LookupResolver: Send + Sync {
    fn resolve(&self) -> GridResult<Arc<TableInfo>>;
}

impl<F> LookupResolver for F
where
    F: Fn() -> GridResult<Arc<TableInfo>> + Send + Sync,
{
    fn resolve(&self) -> GridResult<Arc<TableInfo>> {
        self()
    }
}

pub struct ForeignKey {
    target_schema: Option<String>,
    target_table: String,
    target_column: String,
    display_columns: Vec<String>,
    /// Path of the source column when the lookup is composed into a larger
    /// query; `None` for a top-level lookup.
    parent: Option<FieldKey>,
    /// Scoping filter applied to the target table when the lookup joins.
    scope_filter: Option<SimpleFilter>,
    resolver: Option<Arc<dyn LookupResolver>>,
    cached: OnceLock<Arc<TableInfo>>,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            target_schema: None,
            target_table: table.into(),
            target_column: column.into(),
            display_columns: Vec::new(),
            parent: None,
            scope_filter: None,
            resolver: None,
            cached: OnceLock::new(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.target_schema = Some(schema.into());
        self
    }

    pub fn with_display_columns(mut self, columns: Vec<String>) -> Self {
        self.display_columns = columns;
        self
    }

    pub fn with_scope_filter(mut self, filter: SimpleFilter) -> Self {
        self.scope_filter = Some(filter);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn LookupResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn target_schema(&self) -> Option<&str> {
        self.target_schema.as_deref()
    }

    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn display_columns(&self) -> &[String] {
        &self.display_columns
    }

    pub fn parent(&self) -> Option<&FieldKey> {
        self.parent.as_ref()
    }

    pub fn scope_filter(&self) -> Option<&SimpleFilter> {
        self.scope_filter.as_ref()
    }

    /// Resolve the target table, deferring to the resolver on first use and
    /// caching the result for the lookup's lifetime.
    pub fn target(&self) -> GridResult<Arc<TableInfo>> {
        if let Some(cached) = self.cached.get() {
            return Ok(cached.clone());
        }
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            SchemaError::UnresolvedLookup(self.target_table.clone())
        })?;
        let table = resolver.resolve()?;
        // A concurrent resolve may have won; either value is equivalent.
        let _ = self.cached.set(table.clone());
        Ok(self.cached.get().cloned().unwrap_or(table))
    }

    pub fn is_resolved(&self) -> bool {
        self.cached.get().is_some()
    }

    /// Re-root the lookup's field keys through `mapping`.
    ///
    /// Returns the same `Arc` when the mapping is an identity for this
    /// lookup, so composition never clones unchanged lookups.
    pub fn remap_field_keys(
        self: &Arc<Self>,
        mapping: &HashMap<FieldKey, FieldKey>,
    ) -> Arc<Self> {
        let Some(parent) = &self.parent else {
            return Arc::clone(self);
        };
        match mapping.get(parent) {
            None => Arc::clone(self),
            Some(mapped) if mapped == parent => Arc::clone(self),
            Some(mapped) => {
                let mut fk = ForeignKey::clone(self);
                fk.parent = Some(mapped.clone());
                Arc::new(fk)
            }
        }
    }

    pub fn with_parent(mut self, parent: FieldKey) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl Clone for ForeignKey {
    fn clone(&self) -> Self {
        let cached = OnceLock::new();
        if let Some(t) = self.cached.get() {
            let _ = cached.set(t.clone());
        }
        Self {
            target_schema: self.target_schema.clone(),
            target_table: self.target_table.clone(),
            target_column: self.target_column.clone(),
            display_columns: self.display_columns.clone(),
            parent: self.parent.clone(),
            scope_filter: self.scope_filter.clone(),
            resolver: self.resolver.clone(),
            cached,
        }
    }
}

impl fmt::Debug for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignKey")
            .field("target_schema", &self.target_schema)
            .field("target_table", &self.target_table)
            .field("target_column", &self.target_column)
            .field("display_columns", &self.display_columns)
            .field("parent", &self.parent)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
