//! Query construction and execution over a virtual table.
//!
//! A [`TableSelector`] collects a table, filter, sort, projection, and row
//! window, then snapshots them into an immutable [`SqlFactory`] per call, so
//! later selector mutation never leaks into an in-flight query. Execution
//! returns buffered [`ResultRows`] carrying a completeness flag, or streams
//! row-by-row through [`TableSelector::for_each`].

use std::collections::HashMap;
use std::ops::ControlFlow;

use futures_util::{pin_mut, TryStreamExt};
use tokio_postgres::types::ToSql;
use tracing::{debug, error, warn};

use crate::error::{GridError, GridResult, SqlError, StatementError};
use crate::exec::scope::DbScope;
use crate::exec::selection::SelectionState;
use crate::query::aggregate::{Aggregate, AggregateResult};
use crate::query::filter::{CompareOp, SimpleFilter};
use crate::query::sort::Sort;
use crate::schema::column::ColumnInfo;
use crate::schema::field_key::FieldKey;
use crate::schema::table::TableInfo;
use crate::sql::fragment::SqlFragment;
use crate::types::Value;

pub struct TableSelector<'a> {
    scope: &'a DbScope,
    table: &'a TableInfo,
    filter: SimpleFilter,
    sort: Sort,
    columns: Option<Vec<String>>,
    max_rows: Option<u64>,
    offset: u64,
    named: HashMap<String, Value>,
}

impl<'a> TableSelector<'a> {
    pub fn new(scope: &'a DbScope, table: &'a TableInfo) -> Self {
        Self {
            scope,
            table,
            filter: SimpleFilter::new(),
            sort: Sort::new(),
            columns: None,
            max_rows: None,
            offset: 0,
            named: HashMap::new(),
        }
    }

    pub fn with_filter(mut self, filter: SimpleFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Restrict the projection to the named columns, in order.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Bind a named parameter used by the table's source query.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Restrict to the rows whose primary key is in the selection under
    /// `key`, or its complement. Requires a single-column primary key.
    pub fn restrict_to_selection(
        mut self,
        store: &SelectionState,
        key: &str,
        complement: bool,
    ) -> GridResult<Self> {
        let pk = self.table.pk_columns()?;
        if pk.len() != 1 {
            return Err(StatementError::KeyArity {
                expected: 1,
                actual: pk.len(),
            }
            .into());
        }
        let pk_name = pk[0].name().to_string();
        let values: Vec<Value> = store
            .selected(key)
            .into_iter()
            .map(|id| Value::from(id.as_str()))
            .collect();
        let op = if complement {
            CompareOp::NotIn
        } else {
            CompareOp::In
        };
        self.filter.add_in(pk_name.as_str(), op, values);
        Ok(self)
    }

    /// Filter to one row by its full primary key. `key_values` must match
    /// the key's column count, in declaration order.
    pub fn filter_by_pk(mut self, key_values: &[Value]) -> GridResult<Self> {
        let pk = self.table.pk_columns()?;
        if pk.len() != key_values.len() {
            return Err(StatementError::KeyArity {
                expected: pk.len(),
                actual: key_values.len(),
            }
            .into());
        }
        let names: Vec<String> = pk.iter().map(|c| c.name().to_string()).collect();
        for (name, value) in names.iter().zip(key_values) {
            self.filter
                .add_condition(name.as_str(), CompareOp::Eq, value.clone());
        }
        Ok(self)
    }

    /// Snapshot the current settings into an immutable factory.
    pub fn sql_factory(&self) -> GridResult<SqlFactory> {
        self.assemble(true, true)
    }

    fn assemble(&self, with_sort: bool, with_window: bool) -> GridResult<SqlFactory> {
        let dialect = self.scope.dialect();
        let columns: Vec<ColumnInfo> = match &self.columns {
            Some(names) => names
                .iter()
                .map(|n| {
                    self.table
                        .resolve_column(n)
                        .map(|c| c.into_owned())
                        .ok_or_else(|| crate::error::SchemaError::UnknownColumn(n.clone()).into())
                })
                .collect::<GridResult<_>>()?,
            None => self.table.columns().to_vec(),
        };

        let mut sql = SqlFragment::from("SELECT ");
        let select_list: Vec<String> = columns
            .iter()
            .map(|c| {
                let quoted = dialect.quote_identifier(c.name());
                if c.alias() == c.name() {
                    quoted
                } else {
                    format!("{} AS {}", quoted, dialect.quote_identifier(c.alias()))
                }
            })
            .collect();
        sql.append(select_list.join(", ")).append(" FROM ");
        sql.append_fragment(&self.table.from_sql(dialect, "x"));

        let where_clause = self.filter.to_sql(self.table, dialect)?;
        if !where_clause.is_empty() {
            sql.append(" ").append_fragment(&where_clause);
        }
        if with_sort {
            let order = self.sort.to_sql(self.table, dialect)?;
            if !order.is_empty() {
                sql.append(" ").append_fragment(&order);
            }
        }

        let mut discard = 0;
        if with_window {
            // One extra row feeds the completeness flag.
            let fetch = self.max_rows.map(|m| m + 1);
            if dialect.supports_offset() {
                dialect.limit_rows(&mut sql, fetch, self.offset)?;
            } else {
                // Offset emulation: over-fetch and discard during
                // consumption. Never taken on dialects with native OFFSET.
                dialect.limit_rows(&mut sql, fetch.map(|f| f + self.offset), 0)?;
                discard = self.offset;
            }
        }

        sql.freeze();
        Ok(SqlFactory {
            sql,
            columns,
            discard,
            max_rows: if with_window { self.max_rows } else { None },
        })
    }

    /// Execute and buffer the full result.
    pub async fn rows(&self) -> GridResult<ResultRows> {
        let factory = self.sql_factory()?;
        let raw = self.execute(&factory).await?;
        Ok(ResultRows::collect(factory, raw))
    }

    /// Visit each result row in order, streaming from the driver rather
    /// than buffering the result. The closure can stop early by returning
    /// `ControlFlow::Break`, which abandons the remaining fetch and
    /// releases the connection. Returns the number of rows visited.
    pub async fn for_each<F>(&self, mut f: F) -> GridResult<u64>
    where
        F: FnMut(&[Value]) -> ControlFlow<()>,
    {
        let factory = self.sql_factory()?;
        let dialect = self.scope.dialect();
        let rendered = dialect.render_placeholders(factory.sql().sql());
        let params = factory.sql().resolved_params(&self.named);
        let conn = self.scope.connection().await?;
        debug!(sql = %rendered, "streaming query");
        let stream = conn
            .query_raw(
                rendered.as_str(),
                params.iter().map(|p| p as &(dyn ToSql + Sync)),
            )
            .await
            .map_err(|e| {
                error!(sql = %factory.sql().debug_string(), error = %e, "query failed");
                GridError::from(SqlError::from_pg(e, Some(&rendered)))
            })?;
        pin_mut!(stream);

        let width = factory.columns().len();
        let mut skip = factory.discard();
        let mut visited = 0u64;
        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| SqlError::from_pg(e, Some(&rendered)))?
        {
            // Offset emulation drops leading rows here.
            if skip > 0 {
                skip -= 1;
                continue;
            }
            // The window over-fetches one row for the completeness flag;
            // never hand it to the visitor.
            if let Some(max) = self.max_rows {
                if visited == max {
                    break;
                }
            }
            let values: Vec<Value> = (0..width).map(|i| Value::from_row(&row, i)).collect();
            visited += 1;
            if f(&values).is_break() {
                break;
            }
        }
        Ok(visited)
    }

    /// All values of one column, in result order.
    pub async fn column_values(&self, field: impl Into<FieldKey>) -> GridResult<Vec<Value>> {
        let field = field.into();
        let column = self
            .table
            .column_for_field_key(&field)
            .ok_or_else(|| crate::error::SchemaError::UnknownColumn(field.to_string()))?;
        let name = column.name().to_string();
        let rows = self.rows().await?;
        let idx = rows
            .column_index(&name)
            .ok_or_else(|| crate::error::SchemaError::UnknownColumn(name))?;
        Ok(rows.rows().iter().map(|r| r[idx].clone()).collect())
    }

    /// Count matching rows, ignoring sort and row window.
    pub async fn row_count(&self) -> GridResult<u64> {
        let inner = self.assemble(false, false)?;
        let mut sql = SqlFragment::from("SELECT COUNT(*) FROM (");
        sql.append_fragment(inner.sql()).append(") _count");
        sql.freeze();

        let row = self.scalar_with_retry(&sql).await?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| SqlError::from_pg(e, Some(sql.sql())))?;
        Ok(count as u64)
    }

    /// Whether any row matches, without counting them all.
    pub async fn exists(&self) -> GridResult<bool> {
        let dialect = self.scope.dialect();
        let inner = self.assemble(false, false)?;
        let mut sql = SqlFragment::from("SELECT CASE WHEN EXISTS (");
        sql.append_fragment(inner.sql())
            .append(") THEN ")
            .append(dialect.boolean_literal(true))
            .append(" ELSE ")
            .append(dialect.boolean_literal(false))
            .append(" END");
        sql.freeze();

        let row = self.scalar_with_retry(&sql).await?;
        row.try_get(0)
            .map_err(|e| SqlError::from_pg(e, Some(sql.sql())).into())
    }

    /// Compute summary statistics in one pass over the filtered rows.
    ///
    /// A type-illegal aggregate yields `value: None` without touching the
    /// database; so does a legal aggregate over zero rows. Callers separate
    /// the two via [`crate::query::AggregateKind::is_legal`].
    pub async fn aggregates(&self, aggregates: &[Aggregate]) -> GridResult<Vec<AggregateResult>> {
        let dialect = self.scope.dialect();
        let mut terms: Vec<(usize, SqlFragment)> = Vec::new();
        for (i, agg) in aggregates.iter().enumerate() {
            if let Some(term) = agg.to_sql(self.table, dialect)? {
                terms.push((i, term));
            }
        }
        let mut values: Vec<Option<Value>> = vec![None; aggregates.len()];
        if !terms.is_empty() {
            let inner = self.assemble(false, false)?;
            let mut sql = SqlFragment::from("SELECT ");
            for (pos, (_, term)) in terms.iter().enumerate() {
                if pos > 0 {
                    sql.append(", ");
                }
                sql.append_fragment(term);
            }
            sql.append(" FROM (").append_fragment(inner.sql()).append(") _agg");
            sql.freeze();

            let row = self.scalar_with_retry(&sql).await?;
            for (pos, (agg_idx, _)) in terms.iter().enumerate() {
                match Value::from_row(&row, pos) {
                    Value::Null => {}
                    value => values[*agg_idx] = Some(value),
                }
            }
        }
        Ok(aggregates
            .iter()
            .zip(values)
            .map(|(aggregate, value)| AggregateResult {
                aggregate: aggregate.clone(),
                value,
            })
            .collect())
    }

    async fn execute(&self, factory: &SqlFactory) -> GridResult<Vec<tokio_postgres::Row>> {
        self.run(factory.sql()).await
    }

    async fn run(&self, sql: &SqlFragment) -> GridResult<Vec<tokio_postgres::Row>> {
        let dialect = self.scope.dialect();
        let rendered = dialect.render_placeholders(sql.sql());
        let params = sql.resolved_params(&self.named);
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let conn = self.scope.connection().await?;
        debug!(sql = %rendered, "executing query");
        conn.query(rendered.as_str(), &refs).await.map_err(|e| {
            error!(sql = %sql.debug_string(), error = %e, "query failed");
            GridError::from(SqlError::from_pg(e, Some(&rendered)))
        })
    }

    /// Run a single-row query, retrying once on a transient failure
    /// (serialization or deadlock rollback).
    async fn scalar_with_retry(&self, sql: &SqlFragment) -> GridResult<tokio_postgres::Row> {
        let first = self.run(sql).await;
        let rows = match first {
            Err(GridError::Sql(ref e)) if e.is_transient() => {
                warn!(sql = %sql.sql(), "transient failure, retrying once");
                self.run(sql).await?
            }
            other => other?,
        };
        rows.into_iter()
            .next()
            .ok_or_else(|| SqlError::connection("scalar query returned no rows").into())
    }
}

/// Immutable per-call snapshot of a selector's generated SQL.
#[derive(Debug, Clone)]
pub struct SqlFactory {
    sql: SqlFragment,
    columns: Vec<ColumnInfo>,
    /// Leading rows to drop during consumption (offset emulation).
    discard: u64,
    max_rows: Option<u64>,
}

impl SqlFactory {
    pub fn sql(&self) -> &SqlFragment {
        &self.sql
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn discard(&self) -> u64 {
        self.discard
    }
}

/// Buffered query result.
///
/// `complete` is true when the result was not truncated by the selector's
/// max-rows window.
#[derive(Debug)]
pub struct ResultRows {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
    complete: bool,
}

impl ResultRows {
    fn collect(factory: SqlFactory, raw: Vec<tokio_postgres::Row>) -> Self {
        let width = factory.columns.len();
        let mut rows: Vec<Vec<Value>> = raw
            .into_iter()
            .skip(factory.discard as usize)
            .map(|row| (0..width).map(|i| Value::from_row(&row, i)).collect())
            .collect();
        let complete = match factory.max_rows {
            Some(max) => {
                let complete = rows.len() as u64 <= max;
                rows.truncate(max as usize);
                complete
            }
            None => true,
        };
        Self {
            columns: factory.columns,
            rows,
            complete,
        }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn complete(&self) -> bool {
        self.complete
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Cell accessor by row number and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }
}
