//! Summary statistics over a selected column.

use crate::error::{GridResult, SchemaError};
use crate::schema::field_key::FieldKey;
use crate::schema::table::TableInfo;
use crate::sql::dialect::SqlDialect;
use crate::sql::fragment::SqlFragment;
use crate::types::{SqlType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl AggregateKind {
    pub fn display_name(self) -> &'static str {
        match self {
            AggregateKind::Sum => "Sum",
            AggregateKind::Mean => "Mean",
            AggregateKind::Count => "Count",
            AggregateKind::Min => "Minimum",
            AggregateKind::Max => "Maximum",
        }
    }

    fn sql_function(self) -> &'static str {
        match self {
            AggregateKind::Sum => "SUM",
            AggregateKind::Mean => "AVG",
            AggregateKind::Count => "COUNT",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
        }
    }

    /// Whether the aggregate can be computed over a column of `input` type.
    pub fn is_legal(self, input: SqlType) -> bool {
        match self {
            AggregateKind::Count => true,
            AggregateKind::Sum | AggregateKind::Mean => input.is_numeric(),
            AggregateKind::Min | AggregateKind::Max => {
                input.is_numeric()
                    || input.is_text()
                    || input.is_date_or_time()
                    || input == SqlType::Binary
            }
        }
    }

    /// Result type for a legal aggregate over `input`. Sums over plain
    /// integers widen so they cannot overflow the input type.
    pub fn return_type(self, input: SqlType) -> SqlType {
        match self {
            AggregateKind::Count => SqlType::BigInt,
            AggregateKind::Sum => match input {
                SqlType::SmallInt | SqlType::Integer => SqlType::BigInt,
                SqlType::BigInt => SqlType::Decimal,
                SqlType::Real => SqlType::Double,
                other => other,
            },
            AggregateKind::Mean => {
                if input.is_integral() {
                    SqlType::Double
                } else if input == SqlType::Real {
                    SqlType::Double
                } else {
                    input
                }
            }
            AggregateKind::Min | AggregateKind::Max => input,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    field: FieldKey,
    kind: AggregateKind,
    label: Option<String>,
    distinct: bool,
}

impl Aggregate {
    pub fn new(field: impl Into<FieldKey>, kind: AggregateKind) -> Self {
        Self {
            field: field.into(),
            kind,
            label: None,
            distinct: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn field(&self) -> &FieldKey {
        &self.field
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{} of {}", self.kind.display_name(), self.field),
        }
    }

    /// Render the select-list term, `None` when the aggregate is not legal
    /// for the column's type. Callers distinguish "illegal" from "no rows"
    /// by consulting [`AggregateKind::is_legal`] themselves.
    pub fn to_sql(
        &self,
        table: &TableInfo,
        dialect: &dyn SqlDialect,
    ) -> GridResult<Option<SqlFragment>> {
        let column = table
            .column_for_field_key(&self.field)
            .ok_or_else(|| SchemaError::UnknownColumn(self.field.to_string()))?;
        if !self.kind.is_legal(column.sql_type()) {
            return Ok(None);
        }
        let mut frag = SqlFragment::new();
        frag.append(self.kind.sql_function()).append("(");
        if self.distinct {
            frag.append("DISTINCT ");
        }
        frag.append(dialect.quote_identifier(column.alias())).append(")");
        Ok(Some(frag))
    }
}

/// One computed aggregate. `value` is `None` when the aggregate was
/// type-illegal or no rows matched.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub aggregate: Aggregate,
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnInfo;
    use crate::schema::table::TableSource;
    use crate::sql::dialect::PostgresDialect;

    fn orders() -> TableInfo {
        let mut t = TableInfo::new("orders", TableSource::physical(None, "orders"));
        t.add_column(ColumnInfo::new("id", SqlType::Integer)).unwrap();
        t.add_column(ColumnInfo::new("name", SqlType::Varchar)).unwrap();
        t.add_column(ColumnInfo::new("amount", SqlType::Decimal))
            .unwrap();
        t.add_column(ColumnInfo::new("active", SqlType::Boolean))
            .unwrap();
        t
    }

    #[test]
    fn test_legality_by_kind() {
        assert!(AggregateKind::Sum.is_legal(SqlType::Integer));
        assert!(!AggregateKind::Sum.is_legal(SqlType::Varchar));
        assert!(!AggregateKind::Mean.is_legal(SqlType::Date));
        assert!(AggregateKind::Min.is_legal(SqlType::Varchar));
        assert!(AggregateKind::Max.is_legal(SqlType::Timestamp));
        assert!(!AggregateKind::Min.is_legal(SqlType::Boolean));
        assert!(AggregateKind::Count.is_legal(SqlType::Boolean));
        assert!(AggregateKind::Count.is_legal(SqlType::Other));
    }

    #[test]
    fn test_return_types_widen() {
        assert_eq!(
            AggregateKind::Sum.return_type(SqlType::Integer),
            SqlType::BigInt
        );
        assert_eq!(
            AggregateKind::Sum.return_type(SqlType::BigInt),
            SqlType::Decimal
        );
        assert_eq!(
            AggregateKind::Mean.return_type(SqlType::Integer),
            SqlType::Double
        );
        assert_eq!(
            AggregateKind::Mean.return_type(SqlType::Decimal),
            SqlType::Decimal
        );
        assert_eq!(
            AggregateKind::Count.return_type(SqlType::Varchar),
            SqlType::BigInt
        );
        assert_eq!(AggregateKind::Max.return_type(SqlType::Date), SqlType::Date);
    }

    #[test]
    fn test_sql_rendering() {
        let agg = Aggregate::new("amount", AggregateKind::Sum);
        let frag = agg.to_sql(&orders(), &PostgresDialect).unwrap().unwrap();
        assert_eq!(frag.sql(), "SUM(amount)");

        let agg = Aggregate::new("name", AggregateKind::Count).distinct();
        let frag = agg.to_sql(&orders(), &PostgresDialect).unwrap().unwrap();
        assert_eq!(frag.sql(), "COUNT(DISTINCT name)");
    }

    #[test]
    fn test_illegal_aggregate_renders_none() {
        let agg = Aggregate::new("name", AggregateKind::Sum);
        assert!(agg.to_sql(&orders(), &PostgresDialect).unwrap().is_none());
    }

    #[test]
    fn test_unknown_column_is_error_not_none() {
        let agg = Aggregate::new("bogus", AggregateKind::Count);
        assert!(agg.to_sql(&orders(), &PostgresDialect).is_err());
    }

    #[test]
    fn test_default_label() {
        let agg = Aggregate::new("amount", AggregateKind::Mean);
        assert_eq!(agg.label(), "Mean of amount");
        let agg = agg.with_label("Average amount");
        assert_eq!(agg.label(), "Average amount");
    }
}
