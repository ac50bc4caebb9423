//! The engine's type system: [`SqlType`] column kinds and [`Value`] runtime
//! cells.
//!
//! Every postgres wire type maps onto exactly one `SqlType`; conversions
//! between kinds go through `SqlType::convert`, and `SqlType::promote`
//! defines the join used when columns of different kinds are combined
//! (unions, aggregate results).

use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::Row;
use tracing::debug;

use crate::error::ConversionError;

/// Closed enumeration of the column data kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Null,
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Char,
    Varchar,
    LongVarchar,
    Date,
    Time,
    Timestamp,
    Binary,
    Guid,
    Json,
    Other,
}

/// Default UI input widget hint for a column of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputHint {
    Text,
    Number,
    Checkbox,
    Date,
    Time,
    DateTime,
    File,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SqlType::Null => "NULL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Decimal => "DECIMAL",
            SqlType::Char => "CHAR",
            SqlType::Varchar => "VARCHAR",
            SqlType::LongVarchar => "LONGVARCHAR",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Binary => "BINARY",
            SqlType::Guid => "GUID",
            SqlType::Json => "JSON",
            SqlType::Other => "OTHER",
        };
        f.write_str(s)
    }
}

impl SqlType {
    /// Total mapping from a postgres wire type. Unrecognized types fall back
    /// to `Other`, never an error.
    pub fn from_pg(ty: &Type) -> SqlType {
        match *ty {
            Type::BOOL => SqlType::Boolean,
            Type::INT2 => SqlType::SmallInt,
            Type::INT4 => SqlType::Integer,
            Type::INT8 => SqlType::BigInt,
            Type::FLOAT4 => SqlType::Real,
            Type::FLOAT8 => SqlType::Double,
            Type::NUMERIC => SqlType::Decimal,
            Type::CHAR | Type::BPCHAR => SqlType::Char,
            Type::VARCHAR | Type::NAME => SqlType::Varchar,
            Type::TEXT => SqlType::LongVarchar,
            Type::DATE => SqlType::Date,
            Type::TIME => SqlType::Time,
            Type::TIMESTAMP | Type::TIMESTAMPTZ => SqlType::Timestamp,
            Type::BYTEA => SqlType::Binary,
            Type::UUID => SqlType::Guid,
            Type::JSON | Type::JSONB => SqlType::Json,
            _ => SqlType::Other,
        }
    }

    /// DDL type name, when the kind has one. `Null` and `Other` do not.
    pub fn ddl_name(&self) -> Option<&'static str> {
        match self {
            SqlType::Boolean => Some("BOOLEAN"),
            SqlType::SmallInt => Some("SMALLINT"),
            SqlType::Integer => Some("INTEGER"),
            SqlType::BigInt => Some("BIGINT"),
            SqlType::Real => Some("REAL"),
            SqlType::Double => Some("DOUBLE PRECISION"),
            SqlType::Decimal => Some("NUMERIC"),
            SqlType::Char => Some("CHAR"),
            SqlType::Varchar => Some("VARCHAR"),
            SqlType::LongVarchar => Some("TEXT"),
            SqlType::Date => Some("DATE"),
            SqlType::Time => Some("TIME"),
            SqlType::Timestamp => Some("TIMESTAMP"),
            SqlType::Binary => Some("BYTEA"),
            SqlType::Guid => Some("UUID"),
            SqlType::Json => Some("JSONB"),
            SqlType::Null | SqlType::Other => None,
        }
    }

    pub fn input_hint(&self) -> InputHint {
        match self {
            SqlType::Boolean => InputHint::Checkbox,
            SqlType::SmallInt
            | SqlType::Integer
            | SqlType::BigInt
            | SqlType::Real
            | SqlType::Double
            | SqlType::Decimal => InputHint::Number,
            SqlType::Date => InputHint::Date,
            SqlType::Time => InputHint::Time,
            SqlType::Timestamp => InputHint::DateTime,
            SqlType::Binary => InputHint::File,
            _ => InputHint::Text,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            SqlType::Char | SqlType::Varchar | SqlType::LongVarchar | SqlType::Guid
        )
    }

    pub fn is_date_or_time(&self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::Timestamp)
    }

    /// Lattice join for combining two column kinds.
    ///
    /// Reflexive, commutative; `Null` is the identity; text dominates
    /// everything, wider numerics dominate narrower ones, and incompatible
    /// kinds meet at `Other`.
    pub fn promote(a: SqlType, b: SqlType) -> SqlType {
        if a == b {
            return a;
        }
        if a == SqlType::Null {
            return b;
        }
        if b == SqlType::Null {
            return a;
        }
        // Text absorbs anything; two text kinds take the wider.
        match (a.is_text(), b.is_text()) {
            (true, true) => {
                return if text_rank(a) >= text_rank(b) { a } else { b };
            }
            (true, false) => return widen_text(a),
            (false, true) => return widen_text(b),
            (false, false) => {}
        }
        if a.is_numeric() && b.is_numeric() {
            return if numeric_rank(a) >= numeric_rank(b) {
                a
            } else {
                b
            };
        }
        if a.is_date_or_time() && b.is_date_or_time() {
            // Date + Time or Date + Timestamp both widen to Timestamp.
            return SqlType::Timestamp;
        }
        SqlType::Other
    }

    /// Coerce `value` to this kind.
    ///
    /// Values already of the target kind pass through unchanged. Numeric
    /// coercions are overflow-checked and reject non-integral values for
    /// integer targets; string parsing tolerates a trailing ".0" on
    /// otherwise-integral text.
    pub fn convert(&self, value: &Value) -> Result<Value, ConversionError> {
        if matches!(value, Value::Null) {
            return Ok(Value::Null);
        }
        if value.sql_type() == *self {
            return Ok(value.clone());
        }
        match self {
            SqlType::Null | SqlType::Other => Ok(value.clone()),
            SqlType::Boolean => bool_from(value).map(Value::Bool),
            SqlType::SmallInt => {
                let n = integral_from(value, *self)?;
                if n < i16::MIN as i64 || n > i16::MAX as i64 {
                    Err(ConversionError::new(value, *self, "out of range"))
                } else {
                    Ok(Value::SmallInt(n as i16))
                }
            }
            SqlType::Integer => {
                let n = integral_from(value, *self)?;
                if n < i32::MIN as i64 || n > i32::MAX as i64 {
                    Err(ConversionError::new(value, *self, "out of range"))
                } else {
                    Ok(Value::Int(n as i32))
                }
            }
            SqlType::BigInt => integral_from(value, *self).map(Value::BigInt),
            SqlType::Real => numeric_from(value, *self).map(|f| Value::Real(f as f32)),
            SqlType::Double | SqlType::Decimal => numeric_from(value, *self).map(Value::Double),
            SqlType::Char | SqlType::Varchar | SqlType::LongVarchar | SqlType::Guid => {
                Ok(Value::Text(value.display()))
            }
            SqlType::Date => date_from(value),
            SqlType::Time => time_from(value),
            SqlType::Timestamp => timestamp_from(value),
            SqlType::Binary => match value {
                Value::Bytes(_) => Ok(value.clone()),
                Value::Text(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
                _ => Err(ConversionError::new(value, *self, "not binary data")),
            },
            SqlType::Json => match value {
                Value::Json(_) => Ok(value.clone()),
                Value::Text(s) => serde_json::from_str(s)
                    .map(Value::Json)
                    .map_err(|e| ConversionError::new(value, *self, e.to_string())),
                _ => Err(ConversionError::new(value, *self, "not json")),
            },
        }
    }
}

fn text_rank(t: SqlType) -> u8 {
    match t {
        SqlType::Char => 1,
        SqlType::Guid => 2,
        SqlType::Varchar => 3,
        SqlType::LongVarchar => 4,
        _ => 0,
    }
}

/// A text kind absorbing a non-text kind is at least VARCHAR.
fn widen_text(t: SqlType) -> SqlType {
    if text_rank(t) < text_rank(SqlType::Varchar) {
        SqlType::Varchar
    } else {
        t
    }
}

fn numeric_rank(t: SqlType) -> u8 {
    match t {
        SqlType::SmallInt => 1,
        SqlType::Integer => 2,
        SqlType::BigInt => 3,
        SqlType::Real => 4,
        SqlType::Double => 5,
        SqlType::Decimal => 6,
        _ => 0,
    }
}

fn integral_from(value: &Value, target: SqlType) -> Result<i64, ConversionError> {
    match value {
        Value::SmallInt(n) => Ok(*n as i64),
        Value::Int(n) => Ok(*n as i64),
        Value::BigInt(n) => Ok(*n),
        Value::Real(f) => integral_from_float(*f as f64, value, target),
        Value::Double(f) => integral_from_float(*f, value, target),
        Value::Text(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Ok(n);
            }
            // Tolerate "39.0" but reject "39.5".
            match s.parse::<f64>() {
                Ok(f) => integral_from_float(f, value, target),
                Err(_) => Err(ConversionError::new(value, target, "not a number")),
            }
        }
        _ => Err(ConversionError::new(value, target, "not numeric")),
    }
}

fn integral_from_float(f: f64, value: &Value, target: SqlType) -> Result<i64, ConversionError> {
    if !f.is_finite() || f.fract() != 0.0 {
        return Err(ConversionError::new(value, target, "not an integral value"));
    }
    if f < i64::MIN as f64 || f > i64::MAX as f64 {
        return Err(ConversionError::new(value, target, "out of range"));
    }
    Ok(f as i64)
}

fn numeric_from(value: &Value, target: SqlType) -> Result<f64, ConversionError> {
    match value {
        Value::SmallInt(n) => Ok(*n as f64),
        Value::Int(n) => Ok(*n as f64),
        Value::BigInt(n) => Ok(*n as f64),
        Value::Real(f) => Ok(*f as f64),
        Value::Double(f) => Ok(*f),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ConversionError::new(value, target, "not a number")),
        _ => Err(ConversionError::new(value, target, "not numeric")),
    }
}

fn bool_from(value: &Value) -> Result<bool, ConversionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::SmallInt(0) | Value::Int(0) | Value::BigInt(0) => Ok(false),
        Value::SmallInt(1) | Value::Int(1) | Value::BigInt(1) => Ok(true),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
            _ => Err(ConversionError::new(
                value,
                SqlType::Boolean,
                "not a boolean",
            )),
        },
        _ => Err(ConversionError::new(
            value,
            SqlType::Boolean,
            "not a boolean",
        )),
    }
}

fn date_from(value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Date(_) => Ok(value.clone()),
        Value::Timestamp(ts) => Ok(Value::Date(ts.date())),
        Value::TimestampTz(ts) => Ok(Value::Date(ts.naive_utc().date())),
        Value::Text(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
                .map(Value::Date)
                .map_err(|_| ConversionError::new(value, SqlType::Date, "unparseable date"))
        }
        _ => Err(ConversionError::new(value, SqlType::Date, "not a date")),
    }
}

fn time_from(value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Time(_) => Ok(value.clone()),
        Value::Timestamp(ts) => Ok(Value::Time(ts.time())),
        Value::Text(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map(Value::Time)
                .map_err(|_| ConversionError::new(value, SqlType::Time, "unparseable time"))
        }
        _ => Err(ConversionError::new(value, SqlType::Time, "not a time")),
    }
}

fn timestamp_from(value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Timestamp(_) => Ok(value.clone()),
        Value::TimestampTz(ts) => Ok(Value::Timestamp(ts.naive_utc())),
        Value::Date(d) => Ok(Value::Timestamp(d.and_hms_opt(0, 0, 0).unwrap_or_default())),
        Value::Text(s) => {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(Value::Timestamp)
                .or_else(|_| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map(|d| Value::Timestamp(d.and_hms_opt(0, 0, 0).unwrap_or_default()))
                })
                .map_err(|_| {
                    ConversionError::new(value, SqlType::Timestamp, "unparseable timestamp")
                })
        }
        _ => Err(ConversionError::new(
            value,
            SqlType::Timestamp,
            "not a timestamp",
        )),
    }
}

/// A runtime cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind this value naturally carries.
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Null => SqlType::Null,
            Value::Bool(_) => SqlType::Boolean,
            Value::SmallInt(_) => SqlType::SmallInt,
            Value::Int(_) => SqlType::Integer,
            Value::BigInt(_) => SqlType::BigInt,
            Value::Real(_) => SqlType::Real,
            Value::Double(_) => SqlType::Double,
            Value::Text(_) => SqlType::Varchar,
            Value::Bytes(_) => SqlType::Binary,
            Value::Date(_) => SqlType::Date,
            Value::Time(_) => SqlType::Time,
            Value::Timestamp(_) | Value::TimestampTz(_) => SqlType::Timestamp,
            Value::Json(_) => SqlType::Json,
        }
    }

    /// Human-readable form, used in debug SQL and conversion errors.
    pub fn display(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::SmallInt(n) => n.to_string(),
            Value::Int(n) => n.to_string(),
            Value::BigInt(n) => n.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Double(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("[{} bytes]", b.len()),
            Value::Date(d) => d.to_string(),
            Value::Time(t) => t.to_string(),
            Value::Timestamp(ts) => ts.to_string(),
            Value::TimestampTz(ts) => ts.to_string(),
            Value::Json(j) => j.to_string(),
        }
    }

    /// SQL-literal form, used when inlining parameters for log output.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(_)
            | Value::SmallInt(_)
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::Real(_)
            | Value::Double(_) => self.display(),
            _ => format!("'{}'", self.display().replace('\'', "''")),
        }
    }

    /// Extract the cell at `idx` from a driver row, keyed off the column's
    /// declared type. Unrecognized types fall back to text. A cell the
    /// driver cannot decode is logged and treated as NULL.
    pub fn from_row(row: &Row, idx: usize) -> Value {
        let pg_type = row.columns()[idx].type_().clone();
        match pg_type {
            Type::BOOL => cell::<bool>(row, idx).map(Value::Bool).unwrap_or(Value::Null),
            Type::INT2 => cell::<i16>(row, idx)
                .map(Value::SmallInt)
                .unwrap_or(Value::Null),
            Type::INT4 => cell::<i32>(row, idx).map(Value::Int).unwrap_or(Value::Null),
            Type::INT8 => cell::<i64>(row, idx)
                .map(Value::BigInt)
                .unwrap_or(Value::Null),
            Type::FLOAT4 => cell::<f32>(row, idx).map(Value::Real).unwrap_or(Value::Null),
            Type::FLOAT8 | Type::NUMERIC => cell::<f64>(row, idx)
                .map(Value::Double)
                .unwrap_or(Value::Null),
            Type::BYTEA => cell::<Vec<u8>>(row, idx)
                .map(Value::Bytes)
                .unwrap_or(Value::Null),
            Type::DATE => cell::<NaiveDate>(row, idx)
                .map(Value::Date)
                .unwrap_or(Value::Null),
            Type::TIME => cell::<NaiveTime>(row, idx)
                .map(Value::Time)
                .unwrap_or(Value::Null),
            Type::TIMESTAMP => cell::<NaiveDateTime>(row, idx)
                .map(Value::Timestamp)
                .unwrap_or(Value::Null),
            Type::TIMESTAMPTZ => cell::<DateTime<Utc>>(row, idx)
                .map(Value::TimestampTz)
                .unwrap_or(Value::Null),
            Type::JSON | Type::JSONB => cell::<serde_json::Value>(row, idx)
                .map(Value::Json)
                .unwrap_or(Value::Null),
            _ => cell::<String>(row, idx).map(Value::Text).unwrap_or(Value::Null),
        }
    }
}

fn cell<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
    match row.try_get::<_, Option<T>>(idx) {
        Ok(value) => value,
        Err(e) => {
            let column = row.columns()[idx].name();
            debug!(column, error = %e, "cell decode failed, substituting NULL");
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::SmallInt(v) => v.to_sql(ty, out),
            Value::Int(v) => v.to_sql(ty, out),
            Value::BigInt(v) => v.to_sql(ty, out),
            Value::Real(v) => v.to_sql(ty, out),
            Value::Double(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::TimestampTz(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The slot's runtime variant decides the wire format; type
        // mismatches surface from the server, not here.
        true
    }

    to_sql_checked!();
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SqlType; 18] = [
        SqlType::Null,
        SqlType::Boolean,
        SqlType::SmallInt,
        SqlType::Integer,
        SqlType::BigInt,
        SqlType::Real,
        SqlType::Double,
        SqlType::Decimal,
        SqlType::Char,
        SqlType::Varchar,
        SqlType::LongVarchar,
        SqlType::Date,
        SqlType::Time,
        SqlType::Timestamp,
        SqlType::Binary,
        SqlType::Guid,
        SqlType::Json,
        SqlType::Other,
    ];

    #[test]
    fn test_promote_reflexive() {
        for t in ALL {
            assert_eq!(SqlType::promote(t, t), t, "promote({t}, {t})");
        }
    }

    #[test]
    fn test_promote_commutative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(
                    SqlType::promote(a, b),
                    SqlType::promote(b, a),
                    "promote({a}, {b})"
                );
            }
        }
    }

    #[test]
    fn test_promote_null_identity() {
        for t in ALL {
            assert_eq!(SqlType::promote(SqlType::Null, t), t);
            assert_eq!(SqlType::promote(t, SqlType::Null), t);
        }
    }

    #[test]
    fn test_promote_numeric_widening() {
        assert_eq!(
            SqlType::promote(SqlType::SmallInt, SqlType::Integer),
            SqlType::Integer
        );
        assert_eq!(
            SqlType::promote(SqlType::Integer, SqlType::BigInt),
            SqlType::BigInt
        );
        assert_eq!(
            SqlType::promote(SqlType::BigInt, SqlType::Double),
            SqlType::Double
        );
        assert_eq!(
            SqlType::promote(SqlType::Double, SqlType::Decimal),
            SqlType::Decimal
        );
    }

    #[test]
    fn test_promote_text_dominates() {
        assert_eq!(
            SqlType::promote(SqlType::Varchar, SqlType::Integer),
            SqlType::Varchar
        );
        assert_eq!(
            SqlType::promote(SqlType::Char, SqlType::Double),
            SqlType::Varchar
        );
        assert_eq!(
            SqlType::promote(SqlType::LongVarchar, SqlType::Varchar),
            SqlType::LongVarchar
        );
    }

    #[test]
    fn test_promote_incompatible_is_other() {
        assert_eq!(
            SqlType::promote(SqlType::Boolean, SqlType::Integer),
            SqlType::Other
        );
        assert_eq!(
            SqlType::promote(SqlType::Binary, SqlType::Date),
            SqlType::Other
        );
    }

    #[test]
    fn test_promote_dates() {
        assert_eq!(
            SqlType::promote(SqlType::Date, SqlType::Timestamp),
            SqlType::Timestamp
        );
        assert_eq!(
            SqlType::promote(SqlType::Date, SqlType::Time),
            SqlType::Timestamp
        );
    }

    #[test]
    fn test_convert_integer_tolerant_trailing_zero() {
        let v = SqlType::Integer.convert(&Value::Text("39.0".into())).unwrap();
        assert_eq!(v, Value::Int(39));
    }

    #[test]
    fn test_convert_integer_rejects_fractional() {
        assert!(SqlType::Integer
            .convert(&Value::Text("39.5".into()))
            .is_err());
        assert!(SqlType::Integer.convert(&Value::Double(39.5)).is_err());
    }

    #[test]
    fn test_convert_integer_overflow_checked() {
        assert!(SqlType::SmallInt.convert(&Value::Int(40_000)).is_err());
        assert!(SqlType::Integer
            .convert(&Value::BigInt(i64::MAX))
            .is_err());
        assert_eq!(
            SqlType::BigInt.convert(&Value::Int(7)).unwrap(),
            Value::BigInt(7)
        );
    }

    #[test]
    fn test_convert_idempotent() {
        let cases: Vec<(SqlType, Value)> = vec![
            (SqlType::Integer, Value::Text("42".into())),
            (SqlType::Double, Value::Text("1.5".into())),
            (SqlType::Boolean, Value::Text("true".into())),
            (SqlType::Varchar, Value::Int(9)),
            (SqlType::Date, Value::Text("2024-03-01".into())),
        ];
        for (ty, raw) in cases {
            let once = ty.convert(&raw).unwrap();
            let twice = ty.convert(&once).unwrap();
            assert_eq!(once, twice, "{ty} convert not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_convert_passthrough() {
        let v = Value::Int(5);
        assert_eq!(SqlType::Integer.convert(&v).unwrap(), v);
        assert_eq!(SqlType::Other.convert(&v).unwrap(), v);
    }

    #[test]
    fn test_convert_null_passthrough() {
        for t in ALL {
            assert_eq!(t.convert(&Value::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_convert_boolean_spellings() {
        for s in ["true", "t", "YES", "y", "on", "1"] {
            assert_eq!(
                SqlType::Boolean.convert(&Value::Text(s.into())).unwrap(),
                Value::Bool(true),
                "{s}"
            );
        }
        for s in ["false", "F", "no", "n", "off", "0"] {
            assert_eq!(
                SqlType::Boolean.convert(&Value::Text(s.into())).unwrap(),
                Value::Bool(false),
                "{s}"
            );
        }
        assert!(SqlType::Boolean
            .convert(&Value::Text("maybe".into()))
            .is_err());
    }

    #[test]
    fn test_convert_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            SqlType::Date
                .convert(&Value::Text("2024-03-01".into()))
                .unwrap(),
            Value::Date(d)
        );
        assert_eq!(
            SqlType::Date
                .convert(&Value::Text("03/01/2024".into()))
                .unwrap(),
            Value::Date(d)
        );
        assert_eq!(
            SqlType::Timestamp.convert(&Value::Date(d)).unwrap(),
            Value::Timestamp(d.and_hms_opt(0, 0, 0).unwrap())
        );
        assert!(SqlType::Date
            .convert(&Value::Text("yesterday".into()))
            .is_err());
    }

    #[test]
    fn test_conversion_error_carries_value_and_target() {
        let err = SqlType::Integer
            .convert(&Value::Text("abc".into()))
            .unwrap_err();
        assert_eq!(err.value, "abc");
        assert_eq!(err.target, SqlType::Integer);
    }

    #[test]
    fn test_from_pg_total() {
        assert_eq!(SqlType::from_pg(&Type::INT4), SqlType::Integer);
        assert_eq!(SqlType::from_pg(&Type::NUMERIC), SqlType::Decimal);
        assert_eq!(SqlType::from_pg(&Type::TEXT), SqlType::LongVarchar);
        assert_eq!(SqlType::from_pg(&Type::POINT), SqlType::Other);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.display(), "NULL");
        assert_eq!(Value::Int(-3).display(), "-3");
        assert_eq!(Value::Text("x".into()).display(), "x");
        assert_eq!(Value::Bytes(vec![1, 2]).display(), "[2 bytes]");
    }

    #[test]
    fn test_sql_literal_quoting() {
        assert_eq!(Value::Int(5).to_sql_literal(), "5");
        assert_eq!(
            Value::Text("o'neil".into()).to_sql_literal(),
            "'o''neil'"
        );
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
    }

    #[test]
    fn test_input_hints() {
        assert_eq!(SqlType::Boolean.input_hint(), InputHint::Checkbox);
        assert_eq!(SqlType::Decimal.input_hint(), InputHint::Number);
        assert_eq!(SqlType::Varchar.input_hint(), InputHint::Text);
        assert_eq!(SqlType::Timestamp.input_hint(), InputHint::DateTime);
    }
}
