//! Declarative table metadata overlays.
//!
//! A deployment can ship TOML descriptors that decorate an introspected
//! table with display metadata and lookups without touching code. Unknown
//! column names are skipped with a debug log so a descriptor written against
//! a newer schema still applies cleanly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GridError, GridResult};
use crate::schema::foreign_key::ForeignKey;
use crate::schema::table::TableInfo;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableDescriptor {
    pub title_column: Option<String>,
    pub details_url: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDescriptor {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub format: Option<String>,
    pub hidden: Option<bool>,
    pub required: Option<bool>,
    pub measure: Option<bool>,
    pub dimension: Option<bool>,
    pub lookup: Option<LookupDescriptor>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LookupDescriptor {
    pub schema: Option<String>,
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub display_columns: Vec<String>,
}

impl TableDescriptor {
    pub fn from_toml(text: &str) -> GridResult<Self> {
        toml::from_str(text).map_err(|e| GridError::Config(format!("invalid descriptor: {e}")))
    }

    /// Overlay this descriptor onto `table`. Descriptor fields that are
    /// absent leave the column untouched.
    pub fn apply(&self, table: &mut TableInfo) -> GridResult<()> {
        if let Some(title) = &self.title_column {
            table.set_title_column(title.clone());
        }
        if let Some(url) = &self.details_url {
            table.set_details_url(url.clone());
        }
        for desc in &self.columns {
            let Some(col) = table.column_mut(&desc.name) else {
                debug!(column = %desc.name, "descriptor names a column the table does not have, skipping");
                continue;
            };
            if let Some(label) = &desc.label {
                col.set_label(label.clone())?;
            }
            if let Some(description) = &desc.description {
                col.set_description(description.clone())?;
            }
            if let Some(format) = &desc.format {
                col.set_format(format.clone())?;
            }
            if let Some(hidden) = desc.hidden {
                col.set_hidden(hidden)?;
            }
            if let Some(required) = desc.required {
                col.set_required(required)?;
            }
            if let Some(measure) = desc.measure {
                col.set_measure(measure)?;
            }
            if let Some(dimension) = desc.dimension {
                col.set_dimension(dimension)?;
            }
            if let Some(lookup) = &desc.lookup {
                let mut fk = ForeignKey::new(&lookup.table, &lookup.column)
                    .with_display_columns(lookup.display_columns.clone());
                if let Some(schema) = &lookup.schema {
                    fk = fk.with_schema(schema.clone());
                }
                col.set_foreign_key(fk)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnInfo;
    use crate::schema::table::TableSource;
    use crate::types::SqlType;

    fn sample_table() -> TableInfo {
        let mut t = TableInfo::new("orders", TableSource::physical(Some("sales"), "orders"));
        t.add_column(ColumnInfo::new("Id", SqlType::Integer)).unwrap();
        t.add_column(ColumnInfo::new("CustomerId", SqlType::Integer))
            .unwrap();
        t
    }

    const DESCRIPTOR: &str = r#"
title_column = "Id"

[[columns]]
name = "CustomerId"
label = "Customer"
hidden = false

[columns.lookup]
table = "customers"
column = "Id"
display_columns = ["Name"]

[[columns]]
name = "Ghost"
hidden = true
"#;

    #[test]
    fn test_overlay_applies_metadata_and_lookup() {
        let desc = TableDescriptor::from_toml(DESCRIPTOR).unwrap();
        let mut table = sample_table();
        desc.apply(&mut table).unwrap();

        assert_eq!(table.title_column(), Some("Id"));
        let col = table.column("customerid").unwrap();
        assert_eq!(col.label(), "Customer");
        let fk = col.foreign_key().unwrap();
        assert_eq!(fk.target_table(), "customers");
        assert!(col.dimension());
    }

    #[test]
    fn test_unknown_column_skipped() {
        let desc = TableDescriptor::from_toml(DESCRIPTOR).unwrap();
        let mut table = sample_table();
        desc.apply(&mut table).unwrap();
        assert!(table.column("ghost").is_none());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = TableDescriptor::from_toml("columns = 7").unwrap_err();
        assert!(matches!(err, GridError::Config(_)));
    }
}
