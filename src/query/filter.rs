//! Structured WHERE-clause construction.
//!
//! A [`SimpleFilter`] is an ordered clause list over field keys. It compiles
//! to a parameterized WHERE fragment once a table supplies FieldKey to
//! column resolution, and its leaf clauses round-trip through the flat URL
//! encoding `<region>.<column>~<op>=<value>` used by grid view state.

use crate::error::{GridError, GridResult, SchemaError};
use crate::schema::field_key::FieldKey;
use crate::schema::table::TableInfo;
use crate::sql::dialect::SqlDialect;
use crate::sql::fragment::SqlFragment;
use crate::types::Value;

/// Escape character used in LIKE patterns built from user text.
const LIKE_ESCAPE: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    IsBlank,
    NonBlank,
    Contains,
    DoesNotContain,
    StartsWith,
    In,
    NotIn,
    Between,
}

impl CompareOp {
    pub fn url_code(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Neq => "neq",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::IsBlank => "isblank",
            CompareOp::NonBlank => "isnonblank",
            CompareOp::Contains => "contains",
            CompareOp::DoesNotContain => "doesnotcontain",
            CompareOp::StartsWith => "startswith",
            CompareOp::In => "in",
            CompareOp::NotIn => "notin",
            CompareOp::Between => "between",
        }
    }

    pub fn from_url_code(code: &str) -> Option<Self> {
        Some(match code {
            "eq" => CompareOp::Eq,
            "neq" => CompareOp::Neq,
            "gt" => CompareOp::Gt,
            "gte" => CompareOp::Gte,
            "lt" => CompareOp::Lt,
            "lte" => CompareOp::Lte,
            "isblank" => CompareOp::IsBlank,
            "isnonblank" => CompareOp::NonBlank,
            "contains" => CompareOp::Contains,
            "doesnotcontain" => CompareOp::DoesNotContain,
            "startswith" => CompareOp::StartsWith,
            "in" => CompareOp::In,
            "notin" => CompareOp::NotIn,
            "between" => CompareOp::Between,
            _ => return None,
        })
    }

    fn takes_values(self) -> bool {
        !matches!(self, CompareOp::IsBlank | CompareOp::NonBlank)
    }

    /// Text-matching operators compare against the raw string form, not the
    /// column's declared type.
    fn is_textual(self) -> bool {
        matches!(
            self,
            CompareOp::Contains | CompareOp::DoesNotContain | CompareOp::StartsWith
        )
    }
}

#[derive(Debug, Clone)]
pub enum Clause {
    Compare {
        field: FieldKey,
        op: CompareOp,
        values: Vec<Value>,
    },
    And(Vec<Clause>),
    Or(Vec<Clause>),
    Not(Box<Clause>),
}

#[derive(Debug, Clone, Default)]
pub struct SimpleFilter {
    clauses: Vec<Clause>,
}

impl SimpleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-condition convenience constructor.
    pub fn condition(field: impl Into<FieldKey>, op: CompareOp, value: impl Into<Value>) -> Self {
        let mut filter = Self::new();
        filter.add_condition(field, op, value);
        filter
    }

    pub fn add_condition(
        &mut self,
        field: impl Into<FieldKey>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> &mut Self {
        let value = value.into();
        let values = if op.takes_values() && !value.is_null() {
            vec![value]
        } else {
            Vec::new()
        };
        self.clauses.push(Clause::Compare {
            field: field.into(),
            op,
            values,
        });
        self
    }

    pub fn add_in(
        &mut self,
        field: impl Into<FieldKey>,
        op: CompareOp,
        values: Vec<Value>,
    ) -> &mut Self {
        self.clauses.push(Clause::Compare {
            field: field.into(),
            op,
            values,
        });
        self
    }

    pub fn add_between(
        &mut self,
        field: impl Into<FieldKey>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.clauses.push(Clause::Compare {
            field: field.into(),
            op: CompareOp::Between,
            values: vec![low.into(), high.into()],
        });
        self
    }

    pub fn add_clause(&mut self, clause: Clause) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Compile to a `WHERE ...` fragment, or an empty fragment when there
    /// are no clauses. Clauses are ANDed in insertion order, so parameters
    /// come out in left-to-right text order.
    pub fn to_sql(&self, table: &TableInfo, dialect: &dyn SqlDialect) -> GridResult<SqlFragment> {
        let mut frag = SqlFragment::new();
        if self.clauses.is_empty() {
            return Ok(frag);
        }
        frag.append("WHERE ");
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                frag.append(" AND ");
            }
            compile_clause(clause, table, dialect, &mut frag)?;
        }
        Ok(frag)
    }

    /// Serialize leaf clauses to URL query parameters. Combinator clauses
    /// have no URL form and are programmatic only.
    pub fn to_url(&self, region: &str) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for clause in &self.clauses {
            if let Clause::Compare { field, op, values } = clause {
                let key = format!("{region}.{field}~{}", op.url_code());
                let value = values
                    .iter()
                    .map(|v| v.display())
                    .collect::<Vec<_>>()
                    .join(";");
                out.push((key, value));
            }
        }
        out
    }

    /// Rebuild a filter from URL query parameters, keeping only keys for
    /// `region`. Values stay textual; conversion to column types happens at
    /// compile time.
    pub fn from_url(region: &str, pairs: &[(String, String)]) -> GridResult<Self> {
        let prefix = format!("{region}.");
        let mut filter = Self::new();
        for (key, raw) in pairs {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some((field, code)) = rest.rsplit_once('~') else {
                continue;
            };
            let op = CompareOp::from_url_code(code).ok_or_else(|| {
                GridError::Config(format!("unknown filter operator in {key}: {code}"))
            })?;
            let values: Vec<Value> = if !op.takes_values() || raw.is_empty() {
                Vec::new()
            } else if matches!(op, CompareOp::In | CompareOp::NotIn | CompareOp::Between) {
                raw.split(';').map(Value::from).collect()
            } else {
                vec![Value::from(raw.as_str())]
            };
            filter.clauses.push(Clause::Compare {
                field: FieldKey::parse(field),
                op,
                values,
            });
        }
        Ok(filter)
    }
}

fn compile_clause(
    clause: &Clause,
    table: &TableInfo,
    dialect: &dyn SqlDialect,
    frag: &mut SqlFragment,
) -> GridResult<()> {
    match clause {
        Clause::Compare { field, op, values } => compile_compare(field, *op, values, table, dialect, frag),
        Clause::And(children) | Clause::Or(children) => {
            let joiner = if matches!(clause, Clause::And(_)) {
                " AND "
            } else {
                " OR "
            };
            frag.append("(");
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    frag.append(joiner);
                }
                compile_clause(child, table, dialect, frag)?;
            }
            frag.append(")");
            Ok(())
        }
        Clause::Not(inner) => {
            frag.append("NOT (");
            compile_clause(inner, table, dialect, frag)?;
            frag.append(")");
            Ok(())
        }
    }
}

fn compile_compare(
    field: &FieldKey,
    op: CompareOp,
    values: &[Value],
    table: &TableInfo,
    dialect: &dyn SqlDialect,
    frag: &mut SqlFragment,
) -> GridResult<()> {
    let column = table
        .column_for_field_key(field)
        .ok_or_else(|| SchemaError::UnknownColumn(field.to_string()))?;
    let ident = dialect.quote_identifier(column.name());

    // Text operators bind the raw string; everything else converts to the
    // column's declared type so mismatches fail before reaching the driver.
    let typed = |v: &Value| -> GridResult<Value> {
        if op.is_textual() {
            Ok(Value::from(v.display().as_str()))
        } else {
            Ok(column.sql_type().convert(v)?)
        }
    };

    match op {
        CompareOp::Eq | CompareOp::Neq | CompareOp::Gt | CompareOp::Gte | CompareOp::Lt
        | CompareOp::Lte => {
            let value = single_value(field, op, values)?;
            if value.is_null() {
                // Comparison against NULL degenerates to a blank check.
                match op {
                    CompareOp::Eq => frag.append(&ident).append(" IS NULL"),
                    CompareOp::Neq => frag.append(&ident).append(" IS NOT NULL"),
                    _ => frag.append("1 = 0"),
                };
                return Ok(());
            }
            let sql_op = match op {
                CompareOp::Eq => " = ",
                CompareOp::Neq => " <> ",
                CompareOp::Gt => " > ",
                CompareOp::Gte => " >= ",
                CompareOp::Lt => " < ",
                CompareOp::Lte => " <= ",
                _ => unreachable!(),
            };
            frag.append(&ident).append(sql_op).append_param(typed(&value)?);
        }
        CompareOp::IsBlank => {
            frag.append(&ident).append(" IS NULL");
        }
        CompareOp::NonBlank => {
            frag.append(&ident).append(" IS NOT NULL");
        }
        CompareOp::Contains => {
            let value = single_value(field, op, values)?;
            frag.append(&ident)
                .append(" LIKE ")
                .append_param(format!("%{}%", escape_like(&value.display())))
                .append(like_escape_clause());
        }
        CompareOp::StartsWith => {
            let value = single_value(field, op, values)?;
            frag.append(&ident)
                .append(" LIKE ")
                .append_param(format!("{}%", escape_like(&value.display())))
                .append(like_escape_clause());
        }
        CompareOp::DoesNotContain => {
            // Rows with NULL text do not contain anything.
            let value = single_value(field, op, values)?;
            frag.append("(")
                .append(&ident)
                .append(" IS NULL OR ")
                .append(&ident)
                .append(" NOT LIKE ")
                .append_param(format!("%{}%", escape_like(&value.display())))
                .append(like_escape_clause())
                .append(")");
        }
        CompareOp::In => {
            if values.is_empty() {
                // An empty in-list matches nothing.
                frag.append("1 = 0");
                return Ok(());
            }
            frag.append(&ident).append(" IN (");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    frag.append(", ");
                }
                frag.append_param(typed(v)?);
            }
            frag.append(")");
        }
        CompareOp::NotIn => {
            if values.is_empty() {
                frag.append("1 = 1");
                return Ok(());
            }
            frag.append("(")
                .append(&ident)
                .append(" IS NULL OR ")
                .append(&ident)
                .append(" NOT IN (");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    frag.append(", ");
                }
                frag.append_param(typed(v)?);
            }
            frag.append("))");
        }
        CompareOp::Between => {
            if values.len() != 2 {
                return Err(GridError::Config(format!(
                    "BETWEEN on {field} requires exactly two values, got {}",
                    values.len()
                )));
            }
            frag.append(&ident)
                .append(" BETWEEN ")
                .append_param(typed(&values[0])?)
                .append(" AND ")
                .append_param(typed(&values[1])?);
        }
    }
    Ok(())
}

fn single_value(field: &FieldKey, op: CompareOp, values: &[Value]) -> GridResult<Value> {
    match values {
        [] => Ok(Value::Null),
        [one] => Ok(one.clone()),
        _ => Err(GridError::Config(format!(
            "{} on {field} takes a single value, got {}",
            op.url_code(),
            values.len()
        ))),
    }
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

fn like_escape_clause() -> String {
    format!(" ESCAPE '{LIKE_ESCAPE}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnInfo;
    use crate::schema::table::TableSource;
    use crate::sql::dialect::PostgresDialect;
    use crate::types::SqlType;

    fn orders() -> TableInfo {
        let mut t = TableInfo::new("orders", TableSource::physical(None, "orders"));
        t.add_column(ColumnInfo::new("id", SqlType::Integer)).unwrap();
        t.add_column(ColumnInfo::new("name", SqlType::Varchar)).unwrap();
        t.add_column(ColumnInfo::new("amount", SqlType::Decimal))
            .unwrap();
        t
    }

    #[test]
    fn test_empty_filter_compiles_to_empty_fragment() {
        let frag = SimpleFilter::new()
            .to_sql(&orders(), &PostgresDialect)
            .unwrap();
        assert!(frag.is_empty());
    }

    #[test]
    fn test_eq_converts_to_column_type() {
        let filter = SimpleFilter::condition("id", CompareOp::Eq, "5");
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE id = ?");
        assert_eq!(frag.params().len(), 1);
        assert_eq!(frag.debug_string(), "WHERE id = 5");
    }

    #[test]
    fn test_eq_null_becomes_is_null() {
        let filter = SimpleFilter::condition("amount", CompareOp::Eq, Value::Null);
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE amount IS NULL");
        assert!(frag.params().is_empty());
    }

    #[test]
    fn test_conversion_failure_surfaces() {
        let filter = SimpleFilter::condition("id", CompareOp::Eq, "not a number");
        let err = filter.to_sql(&orders(), &PostgresDialect).unwrap_err();
        assert!(matches!(err, GridError::Conversion(_)));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let filter = SimpleFilter::condition("bogus", CompareOp::Eq, 1);
        let err = filter.to_sql(&orders(), &PostgresDialect).unwrap_err();
        assert!(matches!(
            err,
            GridError::Schema(SchemaError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_clauses_and_in_insertion_order() {
        let mut filter = SimpleFilter::new();
        filter
            .add_condition("name", CompareOp::NonBlank, Value::Null)
            .add_condition("amount", CompareOp::Gt, 10.0);
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE name IS NOT NULL AND amount > ?");
    }

    #[test]
    fn test_like_patterns_escaped() {
        let filter = SimpleFilter::condition("name", CompareOp::Contains, "50%_off!");
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE name LIKE ? ESCAPE '!'");
        assert_eq!(frag.debug_string(), "WHERE name LIKE '%50!%!_off!!%' ESCAPE '!'");
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let mut filter = SimpleFilter::new();
        filter.add_in("id", CompareOp::In, Vec::new());
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE 1 = 0");
    }

    #[test]
    fn test_not_in_tolerates_null() {
        let mut filter = SimpleFilter::new();
        filter.add_in(
            "id",
            CompareOp::NotIn,
            vec![Value::Int(1), Value::Int(2)],
        );
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE (id IS NULL OR id NOT IN (?, ?))");
    }

    #[test]
    fn test_combinators_nest() {
        let mut filter = SimpleFilter::new();
        filter.add_clause(Clause::Or(vec![
            Clause::Compare {
                field: "id".into(),
                op: CompareOp::Eq,
                values: vec![Value::Int(1)],
            },
            Clause::Not(Box::new(Clause::Compare {
                field: "name".into(),
                op: CompareOp::IsBlank,
                values: Vec::new(),
            })),
        ]));
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE (id = ? OR NOT (name IS NULL))");
    }

    #[test]
    fn test_between_requires_two_values() {
        let mut filter = SimpleFilter::new();
        filter.add_in("amount", CompareOp::Between, vec![Value::Int(1)]);
        assert!(filter.to_sql(&orders(), &PostgresDialect).is_err());

        let mut filter = SimpleFilter::new();
        filter.add_between("amount", 1.0, 2.0);
        let frag = filter.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE amount BETWEEN ? AND ?");
    }

    #[test]
    fn test_url_round_trip() {
        let filter = SimpleFilter::condition("id", CompareOp::Eq, 5);
        let pairs = filter.to_url("query");
        assert_eq!(pairs, vec![("query.id~eq".to_string(), "5".to_string())]);

        let back = SimpleFilter::from_url("query", &pairs).unwrap();
        let frag = back.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE id = ?");
        assert_eq!(frag.debug_string(), "WHERE id = 5");
    }

    #[test]
    fn test_url_in_list_semicolons() {
        let mut filter = SimpleFilter::new();
        filter.add_in(
            "id",
            CompareOp::In,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        );
        let pairs = filter.to_url("q");
        assert_eq!(pairs[0], ("q.id~in".to_string(), "1;2;3".to_string()));

        let back = SimpleFilter::from_url("q", &pairs).unwrap();
        let frag = back.to_sql(&orders(), &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE id IN (?, ?, ?)");
    }

    #[test]
    fn test_url_ignores_other_regions() {
        let pairs = vec![
            ("other.id~eq".to_string(), "1".to_string()),
            ("q.id~eq".to_string(), "2".to_string()),
        ];
        let filter = SimpleFilter::from_url("q", &pairs).unwrap();
        assert_eq!(filter.clauses().len(), 1);
    }

    #[test]
    fn test_compare_uses_physical_column_name_not_alias() {
        let mut t = orders();
        t.add_column(ColumnInfo::new("Total Amount", SqlType::Double))
            .unwrap();
        let filter =
            SimpleFilter::condition("Total Amount", CompareOp::Gt, Value::Double(5.0));
        let frag = filter.to_sql(&t, &PostgresDialect).unwrap();
        assert_eq!(frag.sql(), "WHERE \"Total Amount\" > ?");
    }
}
