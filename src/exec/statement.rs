//! Named-parameter prepared statements.
//!
//! A [`ParameterMap`] prepares one statement from a fragment and maps each
//! named parameter to the ordinals where it appears. Constant parameters are
//! bound once and cannot be overridden; named ones are rebound per
//! execution, defaulting to SQL NULL when unset.

use std::collections::HashMap;

use tokio_postgres::types::ToSql;
use tokio_postgres::Statement;
use tracing::{debug, error};

use crate::error::{GridResult, SqlError, StatementError};
use crate::exec::scope::DbScope;
use crate::sql::fragment::{ParamSlot, SqlFragment};
use crate::types::Value;

enum Slot {
    /// Literal from the fragment, fixed at prepare time.
    Literal(Value),
    Named {
        name: String,
        value: Option<Value>,
        /// Marked by `set_constant`; `put` refuses to rebind.
        constant: bool,
    },
}

/// Name-to-ordinal binding table for one statement's parameters.
struct BindingTable {
    slots: Vec<Slot>,
    names: HashMap<String, Vec<usize>>,
}

impl BindingTable {
    fn from_fragment(fragment: &SqlFragment) -> Self {
        let mut slots = Vec::with_capacity(fragment.params().len());
        let mut names: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, slot) in fragment.params().iter().enumerate() {
            match slot {
                ParamSlot::Value(v) => slots.push(Slot::Literal(v.clone())),
                ParamSlot::Named(p) => {
                    names.entry(p.name().to_string()).or_default().push(i);
                    slots.push(Slot::Named {
                        name: p.name().to_string(),
                        value: None,
                        constant: false,
                    });
                }
            }
        }
        Self { slots, names }
    }

    fn bind(&mut self, name: &str, value: Value, as_constant: bool) -> GridResult<()> {
        let ordinals = self
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| StatementError::UnknownParameter(name.to_string()))?;
        for &i in &ordinals {
            if let Slot::Named { constant: true, .. } = self.slots[i] {
                return Err(StatementError::ConstantParameter(name.to_string()).into());
            }
        }
        for &i in &ordinals {
            if let Slot::Named { value: v, constant, .. } = &mut self.slots[i] {
                *v = Some(value.clone());
                *constant = as_constant;
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Named {
                value,
                constant: false,
                ..
            } = slot
            {
                *value = None;
            }
        }
    }

    fn bound_values(&self) -> Vec<Value> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Literal(v) => v.clone(),
                Slot::Named { value, .. } => value.clone().unwrap_or(Value::Null),
            })
            .collect()
    }
}

pub struct ParameterMap {
    conn: deadpool_postgres::Object,
    stmt: Statement,
    sql: String,
    bindings: BindingTable,
}

impl ParameterMap {
    /// Prepare `fragment` on a dedicated connection. The fragment's literal
    /// parameters are fixed; its named parameters become settable slots.
    pub async fn prepare(scope: &DbScope, fragment: &SqlFragment) -> GridResult<Self> {
        let sql = scope.dialect().render_placeholders(fragment.sql());
        let conn = scope.connection().await?;
        let stmt = conn
            .prepare(&sql)
            .await
            .map_err(|e| SqlError::from_pg(e, Some(&sql)))?;
        let bindings = BindingTable::from_fragment(fragment);
        debug!(sql = %sql, named = bindings.names.len(), "prepared statement");
        Ok(Self {
            conn,
            stmt,
            sql,
            bindings,
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.names.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Bind a named parameter. A name binds every ordinal it occupies.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> GridResult<()> {
        self.bindings.bind(name, value.into(), false)
    }

    /// Bind a named parameter once and for all. Later `put` calls on the
    /// name fail, and `clear` leaves it in place.
    pub fn set_constant(&mut self, name: &str, value: impl Into<Value>) -> GridResult<()> {
        self.bindings.bind(name, value.into(), true)
    }

    /// Reset all non-constant named parameters to unset.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Execute with the current bindings, returning the affected row count.
    pub async fn execute(&self) -> GridResult<u64> {
        let params = self.bindings.bound_values();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.conn.execute(&self.stmt, &refs).await.map_err(|e| {
            error!(sql = %self.sql, error = %e, "statement execution failed");
            SqlError::from_pg(e, Some(&self.sql)).into()
        })
    }

    /// Execute once per row of named bindings, returning the total affected
    /// row count. Bindings are cleared between rows, so a name absent from a
    /// row is NULL for that execution.
    pub async fn execute_batch(&mut self, rows: Vec<HashMap<String, Value>>) -> GridResult<u64> {
        let mut total = 0;
        for row in rows {
            self.bindings.clear();
            for (name, value) in row {
                self.put(&name, value)?;
            }
            total += self.execute().await?;
        }
        Ok(total)
    }

    /// Execute a statement carrying a RETURNING clause and reselect the
    /// generated values, one `Vec<Value>` per affected row.
    pub async fn execute_returning(&self) -> GridResult<Vec<Vec<Value>>> {
        let params = self.bindings.bound_values();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self.conn.query(&self.stmt, &refs).await.map_err(|e| {
            error!(sql = %self.sql, error = %e, "statement execution failed");
            SqlError::from_pg(e, Some(&self.sql))
        })?;
        Ok(rows
            .iter()
            .map(|row| {
                (0..row.columns().len())
                    .map(|i| Value::from_row(row, i))
                    .collect()
            })
            .collect())
    }
}
