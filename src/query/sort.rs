//! ORDER BY construction.
//!
//! A [`Sort`] is an ordered list of (field key, direction) pairs with
//! replace-on-reinsert semantics and a compact URL form (`sort=col1,-col2`).
//! Compilation expands each field into its physical sort columns, so a
//! lookup column may contribute several ORDER BY terms and a column with a
//! missing-value indicator gains a secondary term.

use std::collections::HashSet;

use crate::error::{GridResult, SchemaError};
use crate::schema::field_key::FieldKey;
use crate::schema::table::TableInfo;
use crate::sql::dialect::SqlDialect;
use crate::sql::fragment::SqlFragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    fn url_prefix(self) -> &'static str {
        match self {
            SortDirection::Asc => "",
            SortDirection::Desc => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: FieldKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default)]
pub struct Sort {
    fields: Vec<SortField>,
}

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the URL form: comma-separated field keys, each optionally
    /// prefixed with `-` (descending) or `+` (ascending, the default).
    pub fn parse(spec: &str) -> Self {
        let mut sort = Self::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (direction, name) = match part.strip_prefix('-') {
                Some(rest) => (SortDirection::Desc, rest),
                None => (SortDirection::Asc, part.strip_prefix('+').unwrap_or(part)),
            };
            sort.insert(FieldKey::parse(name), direction);
        }
        sort
    }

    /// Append a sort field. Re-inserting a field the sort already contains
    /// removes the old entry, so the field takes the new position and
    /// direction.
    pub fn insert(&mut self, field: impl Into<FieldKey>, direction: SortDirection) -> &mut Self {
        let field = field.into();
        self.fields.retain(|f| !f.field.eq_ignore_case(&field));
        self.fields.push(SortField { field, direction });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn to_url(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}{}", f.direction.url_prefix(), f.field))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Compile to an `ORDER BY ...` fragment, or an empty fragment when
    /// there is nothing to sort on. Physical columns are de-duplicated by
    /// name, keeping the first occurrence's direction.
    pub fn to_sql(&self, table: &TableInfo, dialect: &dyn SqlDialect) -> GridResult<SqlFragment> {
        let mut frag = SqlFragment::new();
        if self.fields.is_empty() {
            return Ok(frag);
        }
        let mut seen: HashSet<String> = HashSet::new();
        let mut terms: Vec<String> = Vec::new();
        for sort_field in &self.fields {
            let column = table
                .column_for_field_key(&sort_field.field)
                .ok_or_else(|| SchemaError::UnknownColumn(sort_field.field.to_string()))?;
            for key in column.sort_field_keys() {
                let physical = table
                    .column_for_field_key(&key)
                    .ok_or_else(|| SchemaError::UnknownColumn(key.to_string()))?;
                if !seen.insert(physical.name().to_lowercase()) {
                    continue;
                }
                terms.push(format!(
                    "{} {}",
                    dialect.quote_identifier(physical.name()),
                    sort_field.direction.keyword()
                ));
            }
        }
        if terms.is_empty() {
            return Ok(frag);
        }
        frag.append("ORDER BY ").append(terms.join(", "));
        Ok(frag)
    }
}
