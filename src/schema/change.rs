//! Schema change descriptions.
//!
//! A [`TableChange`] is a dialect-neutral batch of DDL operations against a
//! single table. The dialect turns it into concrete statements, and
//! [`TableChange::apply`] runs those inside a caller-supplied transaction so
//! a batch either lands whole or not at all.

use tracing::debug;

use crate::error::{GridResult, SqlError};
use crate::exec::scope::ScopedTransaction;
use crate::sql::dialect::SqlDialect;
use crate::types::SqlType;

/// Column definition for CREATE TABLE / ADD COLUMN.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
    /// Character length for sized text columns.
    pub size: Option<u32>,
    pub nullable: bool,
    /// Rendered verbatim into the DEFAULT clause.
    pub default: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            size: None,
            nullable: true,
            default: None,
        }
    }

    pub fn sized(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone)]
pub struct ConstraintSpec {
    pub name: String,
    /// Constraint body after the name, e.g. `CHECK (amount > 0)`.
    pub definition: String,
}

#[derive(Debug, Clone)]
pub enum ChangeOp {
    CreateTable {
        columns: Vec<ColumnSpec>,
        pk: Vec<String>,
    },
    DropTable,
    AddColumns(Vec<ColumnSpec>),
    DropColumns(Vec<String>),
    /// (old name, new name) pairs.
    RenameColumns(Vec<(String, String)>),
    /// (column, new character length) pairs.
    ResizeColumns(Vec<(String, u32)>),
    AddIndexes(Vec<IndexSpec>),
    DropIndexes(Vec<String>),
    AddConstraints(Vec<ConstraintSpec>),
    DropConstraints(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct TableChange {
    pub schema: Option<String>,
    pub table: String,
    pub ops: Vec<ChangeOp>,
}

impl TableChange {
    pub fn new(schema: Option<&str>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.map(|s| s.to_string()),
            table: table.into(),
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: ChangeOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Render and run every statement in order inside `tx`. Stops at the
    /// first failure; nothing is committed here, that stays with the
    /// transaction owner.
    pub async fn apply(
        &self,
        dialect: &dyn SqlDialect,
        tx: &mut ScopedTransaction,
    ) -> GridResult<()> {
        for statement in dialect.change_statements(self)? {
            debug!(table = %self.table, statement = %statement, "applying schema change");
            tx.client()
                .batch_execute(&statement)
                .await
                .map_err(|e| SqlError::from_pg(e, Some(&statement)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_ops() {
        let mut change = TableChange::new(Some("sales"), "orders");
        assert!(change.is_empty());
        change
            .push(ChangeOp::AddColumns(vec![
                ColumnSpec::new("note", SqlType::Varchar).sized(100)
            ]))
            .push(ChangeOp::DropIndexes(vec!["orders_note_idx".into()]));
        assert_eq!(change.ops.len(), 2);
    }

    #[test]
    fn test_column_spec_builders() {
        let spec = ColumnSpec::new("amount", SqlType::Decimal)
            .not_null()
            .with_default("0");
        assert!(!spec.nullable);
        assert_eq!(spec.default.as_deref(), Some("0"));
        assert_eq!(spec.size, None);
    }
}
