//! Virtual tables.
//!
//! A [`TableInfo`] is an in-memory relational schema description: an
//! ordered, name-unique set of columns with a primary-key subset and a FROM
//! source, which is either a physical table name or a full subquery for
//! computed tables.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::schema::column::ColumnInfo;
use crate::schema::field_key::FieldKey;
use crate::sql::dialect::SqlDialect;
use crate::sql::fragment::SqlFragment;

/// Where a table's rows come from.
#[derive(Debug, Clone)]
pub enum TableSource {
    Physical {
        schema: Option<String>,
        name: String,
    },
    /// A computed table: a complete subquery, parameters included.
    Query(SqlFragment),
}

impl TableSource {
    pub fn physical(schema: Option<&str>, name: impl Into<String>) -> Self {
        TableSource::Physical {
            schema: schema.map(|s| s.to_string()),
            name: name.into(),
        }
    }

    pub fn query(frag: SqlFragment) -> Self {
        TableSource::Query(frag)
    }
}

/// Hook for computed/virtual columns not present in the static column set.
pub trait ColumnResolver: Send + Sync {
    fn resolve(&self, table: &TableInfo, name: &str) -> Option<ColumnInfo>;
}

pub struct TableInfo {
    name: String,
    source: TableSource,
    columns: Vec<ColumnInfo>,
    /// Lowercased name -> position in `columns`.
    index: HashMap<String, usize>,
    pk: Vec<String>,
    title_column: Option<String>,
    details_url: Option<String>,
    resolver: Option<Arc<dyn ColumnResolver>>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, source: TableSource) -> Self {
        Self {
            name: name.into(),
            source,
            columns: Vec::new(),
            index: HashMap::new(),
            pk: Vec::new(),
            title_column: None,
            details_url: None,
            resolver: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    /// Add a column. Fails on a duplicate name (case-insensitive), leaving
    /// the column set unchanged.
    pub fn add_column(&mut self, column: ColumnInfo) -> Result<(), SchemaError> {
        let key = column.name().to_lowercase();
        if self.index.contains_key(&key) {
            return Err(SchemaError::DuplicateColumn(column.name().to_string()));
        }
        self.index.insert(key, self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<ColumnInfo> {
        let idx = *self.index.get(&name.to_lowercase())?;
        let removed = self.columns.remove(idx);
        self.index.clear();
        for (i, col) in self.columns.iter().enumerate() {
            self.index.insert(col.name().to_lowercase(), i);
        }
        self.pk.retain(|c| !c.eq_ignore_ascii_case(name));
        Some(removed)
    }

    /// Case-insensitive lookup in the static column set.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.columns[i])
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnInfo> {
        let idx = *self.index.get(&name.to_lowercase())?;
        Some(&mut self.columns[idx])
    }

    /// Lookup falling back to the table's resolver hook for computed
    /// columns. Absence is explicit, never an error.
    pub fn resolve_column(&self, name: &str) -> Option<Cow<'_, ColumnInfo>> {
        if let Some(col) = self.column(name) {
            return Some(Cow::Borrowed(col));
        }
        self.resolver
            .as_ref()
            .and_then(|r| r.resolve(self, name))
            .map(Cow::Owned)
    }

    /// Find the column carrying `key`, matching either a lookup-qualified
    /// field key or a plain column name.
    pub fn column_for_field_key(&self, key: &FieldKey) -> Option<&ColumnInfo> {
        if key.is_simple() {
            if let Some(col) = self.column(key.name()) {
                return Some(col);
            }
        }
        self.columns.iter().find(|c| c.field_key().eq_ignore_case(key))
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn set_pk(&mut self, names: Vec<String>) -> Result<(), SchemaError> {
        for name in &names {
            if self.column(name).is_none() {
                return Err(SchemaError::UnknownColumn(name.clone()));
            }
        }
        self.pk = names;
        Ok(())
    }

    pub fn pk(&self) -> &[String] {
        &self.pk
    }

    pub fn pk_columns(&self) -> Result<Vec<&ColumnInfo>, SchemaError> {
        if self.pk.is_empty() {
            return Err(SchemaError::NoPrimaryKey(self.name.clone()));
        }
        // set_pk validated the names.
        Ok(self.pk.iter().filter_map(|n| self.column(n)).collect())
    }

    pub fn set_title_column(&mut self, name: impl Into<String>) {
        self.title_column = Some(name.into());
    }

    pub fn title_column(&self) -> Option<&str> {
        self.title_column.as_deref()
    }

    pub fn set_details_url(&mut self, template: impl Into<String>) {
        self.details_url = Some(template.into());
    }

    pub fn details_url(&self) -> Option<&str> {
        self.details_url.as_deref()
    }

    pub fn set_resolver(&mut self, resolver: Arc<dyn ColumnResolver>) {
        self.resolver = Some(resolver);
    }

    /// Lock every column; the table is finished being constructed.
    pub fn lock_columns(&mut self) {
        for col in &mut self.columns {
            col.lock();
        }
    }

    /// Render the FROM fragment: a (possibly schema-qualified) name for
    /// physical tables, a parenthesized subquery for computed ones.
    pub fn from_sql(&self, dialect: &dyn SqlDialect, alias: &str) -> SqlFragment {
        let mut frag = SqlFragment::new();
        match &self.source {
            TableSource::Physical { schema, name } => {
                if let Some(schema) = schema {
                    frag.append(dialect.quote_identifier(schema)).append(".");
                }
                frag.append(dialect.quote_identifier(name));
            }
            TableSource::Query(query) => {
                frag.append("(").append_fragment(query).append(")");
            }
        }
        frag.append(" ").append(dialect.quote_identifier(alias));
        frag
    }
}

impl fmt::Debug for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableInfo")
            .field("name", &self.name)
            .field("columns", &self.column_names())
            .field("pk", &self.pk)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::PostgresDialect;
    use crate::types::SqlType;

    fn orders() -> TableInfo {
        let mut t = TableInfo::new("orders", TableSource::physical(Some("sales"), "orders"));
        t.add_column(ColumnInfo::new("Id", SqlType::Integer)).unwrap();
        t.add_column(ColumnInfo::new("Name", SqlType::Varchar)).unwrap();
        t.add_column(ColumnInfo::new("Amount", SqlType::Decimal)).unwrap();
        t.set_pk(vec!["Id".into()]).unwrap();
        t
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let t = orders();
        assert!(t.column("id").is_some());
        assert!(t.column("ID").is_some());
        assert!(t.column("amount").is_some());
        assert!(t.column("missing").is_none());
    }

    #[test]
    fn test_duplicate_column_rejected_and_set_unchanged() {
        let mut t = orders();
        let err = t
            .add_column(ColumnInfo::new("AMOUNT", SqlType::Double))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn(_)));
        assert_eq!(t.columns().len(), 3);
        assert_eq!(t.column("amount").unwrap().sql_type(), SqlType::Decimal);
    }

    #[test]
    fn test_remove_column_reindexes() {
        let mut t = orders();
        let removed = t.remove_column("name").unwrap();
        assert_eq!(removed.name(), "Name");
        assert_eq!(t.columns().len(), 2);
        assert!(t.column("amount").is_some());
        assert_eq!(t.column("amount").unwrap().name(), "Amount");
    }

    #[test]
    fn test_pk_validation() {
        let mut t = orders();
        assert!(matches!(
            t.set_pk(vec!["nope".into()]).unwrap_err(),
            SchemaError::UnknownColumn(_)
        ));
        let pk = t.pk_columns().unwrap();
        assert_eq!(pk.len(), 1);
        assert_eq!(pk[0].name(), "Id");
    }

    #[test]
    fn test_no_primary_key_error() {
        let t = TableInfo::new("bare", TableSource::physical(None, "bare"));
        assert!(matches!(
            t.pk_columns().unwrap_err(),
            SchemaError::NoPrimaryKey(_)
        ));
    }

    #[test]
    fn test_resolver_hook_fallback() {
        struct RowIdResolver;
        impl ColumnResolver for RowIdResolver {
            fn resolve(&self, _table: &TableInfo, name: &str) -> Option<ColumnInfo> {
                if name.eq_ignore_ascii_case("rowid") {
                    Some(ColumnInfo::new("RowId", SqlType::Integer))
                } else {
                    None
                }
            }
        }
        let mut t = orders();
        t.set_resolver(Arc::new(RowIdResolver));
        assert!(t.resolve_column("rowid").is_some());
        assert!(t.resolve_column("amount").is_some());
        assert!(t.resolve_column("nothing").is_none());
    }

    #[test]
    fn test_from_sql_physical() {
        let t = orders();
        let frag = t.from_sql(&PostgresDialect, "x");
        assert_eq!(frag.sql(), "sales.orders x");
    }

    #[test]
    fn test_from_sql_subquery_carries_parameters() {
        let mut inner = SqlFragment::from("SELECT id FROM sales.orders WHERE amount > ");
        inner.append_param(10.0);
        let t = TableInfo::new("bigorders", TableSource::query(inner));
        let frag = t.from_sql(&PostgresDialect, "x");
        assert_eq!(
            frag.sql(),
            "(SELECT id FROM sales.orders WHERE amount > ?) x"
        );
        assert_eq!(frag.params().len(), 1);
    }

    #[test]
    fn test_column_for_field_key() {
        let mut t = orders();
        let mut lookup_col = ColumnInfo::new("CustomerName", SqlType::Varchar);
        lookup_col
            .set_field_key(FieldKey::parse("customer/name"))
            .unwrap();
        t.add_column(lookup_col).unwrap();

        assert!(t.column_for_field_key(&FieldKey::new("amount")).is_some());
        let found = t
            .column_for_field_key(&FieldKey::parse("Customer/Name"))
            .unwrap();
        assert_eq!(found.name(), "CustomerName");
        assert!(t
            .column_for_field_key(&FieldKey::parse("customer/phone"))
            .is_none());
    }
}
