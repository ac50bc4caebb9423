//! Column metadata.
//!
//! A [`ColumnInfo`] describes one column of a virtual table. Columns are
//! mutable while a table is being constructed and locked afterwards; every
//! setter funnels through one `check_locked` helper, so a locked column
//! fails fast instead of silently ignoring mutation.
//!
//! [`WrappedColumn`] decorates a column without copying it: a delegate plus
//! a struct of per-property overrides consulted first by every getter. This
//! supports "lock the base, override on top".

use std::sync::Arc;

use crate::error::SchemaError;
use crate::schema::field_key::FieldKey;
use crate::schema::foreign_key::ForeignKey;
use crate::types::SqlType;

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    name: String,
    field_key: FieldKey,
    alias: String,
    sql_type: SqlType,
    nullable: bool,
    required: bool,
    hidden: bool,
    measure: bool,
    dimension: bool,
    label: Option<String>,
    description: Option<String>,
    format: Option<String>,
    fk: Option<ForeignKey>,
    /// Sibling column carrying missing-value indicators, if any.
    mv_indicator: Option<String>,
    locked: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        let name = name.into();
        Self {
            alias: legal_alias(&name),
            field_key: FieldKey::new(name.clone()),
            measure: sql_type.is_numeric(),
            name,
            sql_type,
            nullable: true,
            required: false,
            hidden: false,
            dimension: false,
            label: None,
            description: None,
            format: None,
            fk: None,
            mv_indicator: None,
            locked: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_key(&self) -> &FieldKey {
        &self.field_key
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn measure(&self) -> bool {
        self.measure
    }

    pub fn dimension(&self) -> bool {
        self.dimension
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.fk.as_ref()
    }

    pub fn mv_indicator(&self) -> Option<&str> {
        self.mv_indicator.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Finalize the column. Mutating setters fail from here on.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    fn check_locked(&self) -> Result<(), SchemaError> {
        if self.locked {
            Err(SchemaError::Locked(format!("column \"{}\"", self.name)))
        } else {
            Ok(())
        }
    }

    pub fn set_field_key(&mut self, key: FieldKey) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.field_key = key;
        Ok(())
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.alias = alias.into();
        Ok(())
    }

    pub fn set_nullable(&mut self, nullable: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.nullable = nullable;
        Ok(())
    }

    pub fn set_required(&mut self, required: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.required = required;
        Ok(())
    }

    pub fn set_hidden(&mut self, hidden: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.hidden = hidden;
        Ok(())
    }

    pub fn set_measure(&mut self, measure: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.measure = measure;
        Ok(())
    }

    pub fn set_dimension(&mut self, dimension: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.dimension = dimension;
        Ok(())
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.label = Some(label.into());
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.description = Some(description.into());
        Ok(())
    }

    pub fn set_format(&mut self, format: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.format = Some(format.into());
        Ok(())
    }

    pub fn set_foreign_key(&mut self, fk: ForeignKey) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.dimension = true;
        self.fk = Some(fk);
        Ok(())
    }

    pub fn set_mv_indicator(&mut self, column: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.mv_indicator = Some(column.into());
        Ok(())
    }

    /// Field keys of the physical columns this column sorts by.
    ///
    /// A lookup sorts by its target display columns; a missing-value-enabled
    /// column appends a secondary sort on its indicator column.
    pub fn sort_field_keys(&self) -> Vec<FieldKey> {
        let mut keys = Vec::new();
        match self.fk.as_ref().filter(|fk| !fk.display_columns().is_empty()) {
            Some(fk) => {
                for display in fk.display_columns() {
                    keys.push(self.field_key.child(display.clone()));
                }
            }
            None => keys.push(self.field_key.clone()),
        }
        if let Some(ind) = &self.mv_indicator {
            let key = match self.field_key.parent() {
                Some(parent) => parent.child(ind.clone()),
                None => FieldKey::new(ind.clone()),
            };
            keys.push(key);
        }
        keys
    }
}

/// Derive a legal SQL alias from a column name.
fn legal_alias(name: &str) -> String {
    let mut alias: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if alias.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        alias.insert(0, '_');
    }
    alias
}

/// Per-property overrides for a [`WrappedColumn`]. `None` means "forward to
/// the delegate".
#[derive(Debug, Clone, Default)]
struct ColumnOverrides {
    field_key: Option<FieldKey>,
    alias: Option<String>,
    label: Option<String>,
    description: Option<String>,
    format: Option<String>,
    hidden: Option<bool>,
    required: Option<bool>,
    measure: Option<bool>,
    dimension: Option<bool>,
}

/// Decorates a shared column with a sparse set of property overrides.
///
/// The delegate is never touched; each setter records an override that
/// getters consult before forwarding. The wrapper carries its own lock,
/// independent of the delegate's.
#[derive(Debug, Clone)]
pub struct WrappedColumn {
    delegate: Arc<ColumnInfo>,
    overrides: ColumnOverrides,
    locked: bool,
}

impl WrappedColumn {
    pub fn new(delegate: Arc<ColumnInfo>) -> Self {
        Self {
            delegate,
            overrides: ColumnOverrides::default(),
            locked: false,
        }
    }

    pub fn delegate(&self) -> &Arc<ColumnInfo> {
        &self.delegate
    }

    pub fn name(&self) -> &str {
        self.delegate.name()
    }

    pub fn field_key(&self) -> &FieldKey {
        self.overrides
            .field_key
            .as_ref()
            .unwrap_or_else(|| self.delegate.field_key())
    }

    pub fn alias(&self) -> &str {
        self.overrides
            .alias
            .as_deref()
            .unwrap_or_else(|| self.delegate.alias())
    }

    pub fn sql_type(&self) -> SqlType {
        self.delegate.sql_type()
    }

    pub fn label(&self) -> &str {
        self.overrides
            .label
            .as_deref()
            .unwrap_or_else(|| self.delegate.label())
    }

    pub fn description(&self) -> Option<&str> {
        self.overrides
            .description
            .as_deref()
            .or_else(|| self.delegate.description())
    }

    pub fn format(&self) -> Option<&str> {
        self.overrides
            .format
            .as_deref()
            .or_else(|| self.delegate.format())
    }

    pub fn hidden(&self) -> bool {
        self.overrides.hidden.unwrap_or_else(|| self.delegate.hidden())
    }

    pub fn required(&self) -> bool {
        self.overrides
            .required
            .unwrap_or_else(|| self.delegate.required())
    }

    pub fn measure(&self) -> bool {
        self.overrides
            .measure
            .unwrap_or_else(|| self.delegate.measure())
    }

    pub fn dimension(&self) -> bool {
        self.overrides
            .dimension
            .unwrap_or_else(|| self.delegate.dimension())
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.delegate.foreign_key()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    fn check_locked(&self) -> Result<(), SchemaError> {
        if self.locked {
            Err(SchemaError::Locked(format!(
                "column wrapper \"{}\"",
                self.delegate.name()
            )))
        } else {
            Ok(())
        }
    }

    pub fn set_field_key(&mut self, key: FieldKey) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.field_key = Some(key);
        Ok(())
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.alias = Some(alias.into());
        Ok(())
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.label = Some(label.into());
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.description = Some(description.into());
        Ok(())
    }

    pub fn set_format(&mut self, format: impl Into<String>) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.format = Some(format.into());
        Ok(())
    }

    pub fn set_hidden(&mut self, hidden: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.hidden = Some(hidden);
        Ok(())
    }

    pub fn set_required(&mut self, required: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.required = Some(required);
        Ok(())
    }

    pub fn set_measure(&mut self, measure: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.measure = Some(measure);
        Ok(())
    }

    pub fn set_dimension(&mut self, dimension: bool) -> Result<(), SchemaError> {
        self.check_locked()?;
        self.overrides.dimension = Some(dimension);
        Ok(())
    }
}
