//! Error types for the gridsql engine.
//!
//! Driver errors never leave this crate unwrapped: execution failures are
//! classified by SQLSTATE into a [`SqlError`] before they cross the selector
//! boundary, so callers can tell a data-integrity violation from a generic
//! failure without depending on tokio-postgres error internals.

use std::fmt;

use thiserror::Error;

use crate::types::{SqlType, Value};

pub type GridResult<T> = Result<T, GridError>;

/// Top-level error for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Statement(#[from] StatementError),

    /// The active dialect cannot express the requested operation.
    #[error("{operation} is not supported by the {dialect} dialect")]
    Unsupported {
        dialect: &'static str,
        operation: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A value could not be coerced to a column's declared type.
///
/// Always recoverable by the caller; form-binding collaborators surface these
/// as per-field validation messages.
#[derive(Debug, Clone, Error)]
#[error("cannot convert {value} to {target}: {reason}")]
pub struct ConversionError {
    /// Display form of the offending value.
    pub value: String,
    pub target: SqlType,
    pub reason: String,
}

impl ConversionError {
    pub fn new(value: &Value, target: SqlType, reason: impl Into<String>) -> Self {
        Self {
            value: value.display(),
            target,
            reason: reason.into(),
        }
    }
}

/// Broad classification of a driver-reported failure.
///
/// Derived from the SQLSTATE class the same way the connection layer
/// categorizes errors; callers branch on `Integrity` (validation message)
/// versus everything else (fatal), and the count/exists path retries once on
/// `Transient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorKind {
    /// Integrity constraint violation (SQLSTATE class 23).
    Integrity,
    /// Transaction serialization/deadlock failure (class 40); safe to retry
    /// when no explicit transaction is active.
    Transient,
    /// Connection/communication failure (class 08, or transport errors).
    Connection,
    /// Grammar problems (class 42 syntax codes).
    Syntax,
    /// Missing table/column, ambiguous reference (other class 42 codes).
    Semantic,
    /// Everything else.
    Generic,
}

impl fmt::Display for SqlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SqlErrorKind::Integrity => "integrity violation",
            SqlErrorKind::Transient => "transient failure",
            SqlErrorKind::Connection => "connection failure",
            SqlErrorKind::Syntax => "syntax error",
            SqlErrorKind::Semantic => "semantic error",
            SqlErrorKind::Generic => "sql error",
        };
        f.write_str(s)
    }
}

/// SQLSTATE-classified execution error carrying diagnostics.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct SqlError {
    pub kind: SqlErrorKind,
    /// Five-character SQLSTATE, when the server reported one.
    pub sqlstate: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// Constraint name for integrity violations, when available.
    pub constraint: Option<String>,
    /// The rendered SQL that failed, for diagnostics.
    pub sql: Option<String>,
    #[source]
    pub source: Option<tokio_postgres::Error>,
}

impl SqlError {
    /// Classify a driver error, keeping the statement text for diagnostics.
    pub fn from_pg(err: tokio_postgres::Error, sql: Option<&str>) -> Self {
        if let Some(db) = err.as_db_error() {
            let code = db.code().code().to_string();
            SqlError {
                kind: classify_sqlstate(&code),
                sqlstate: Some(code),
                message: db.message().to_string(),
                detail: db.detail().map(|s| s.to_string()),
                hint: db.hint().map(|s| s.to_string()),
                constraint: db.constraint().map(|s| s.to_string()),
                sql: sql.map(|s| s.to_string()),
                source: Some(err),
            }
        } else {
            SqlError {
                kind: SqlErrorKind::Connection,
                sqlstate: None,
                message: err.to_string(),
                detail: None,
                hint: None,
                constraint: None,
                sql: sql.map(|s| s.to_string()),
                source: Some(err),
            }
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        SqlError {
            kind: SqlErrorKind::Connection,
            sqlstate: None,
            message: message.into(),
            detail: None,
            hint: None,
            constraint: None,
            sql: None,
            source: None,
        }
    }

    pub fn is_integrity(&self) -> bool {
        self.kind == SqlErrorKind::Integrity
    }

    pub fn is_transient(&self) -> bool {
        self.kind == SqlErrorKind::Transient
    }
}

/// Map a SQLSTATE code onto an error kind.
pub fn classify_sqlstate(code: &str) -> SqlErrorKind {
    if code.len() < 2 {
        return SqlErrorKind::Generic;
    }
    match &code[..2] {
        // Class 23: Integrity Constraint Violation
        "23" => SqlErrorKind::Integrity,
        // Class 40: Transaction Rollback (serialization failure, deadlock)
        "40" => SqlErrorKind::Transient,
        // Class 08: Connection Exception
        "08" => SqlErrorKind::Connection,
        // Class 42: Syntax Error or Access Rule Violation
        "42" => {
            if code == "42601" || code == "42000" {
                SqlErrorKind::Syntax
            } else {
                // 42P01 = undefined_table, 42703 = undefined_column, etc.
                SqlErrorKind::Semantic
            }
        }
        _ => SqlErrorKind::Generic,
    }
}

/// Schema construction and mutation errors. Immediate, non-recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("column \"{0}\" already exists")]
    DuplicateColumn(String),

    #[error("cannot modify locked {0}")]
    Locked(String),

    #[error("unknown column \"{0}\"")]
    UnknownColumn(String),

    #[error("lookup to \"{0}\" has no resolver")]
    UnresolvedLookup(String),

    #[error("primary key is not defined for table \"{0}\"")]
    NoPrimaryKey(String),
}

/// Prepared-statement parameter errors. Immediate, non-recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    #[error("unknown parameter \"{0}\"")]
    UnknownParameter(String),

    #[error("parameter \"{0}\" is a constant and cannot be rebound")]
    ConstantParameter(String),

    #[error("expected {expected} key value(s), got {actual}")]
    KeyArity { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_integrity() {
        assert_eq!(classify_sqlstate("23505"), SqlErrorKind::Integrity);
        assert_eq!(classify_sqlstate("23503"), SqlErrorKind::Integrity);
    }

    #[test]
    fn test_classify_transient() {
        assert_eq!(classify_sqlstate("40001"), SqlErrorKind::Transient);
        assert_eq!(classify_sqlstate("40P01"), SqlErrorKind::Transient);
    }

    #[test]
    fn test_classify_syntax_vs_semantic() {
        assert_eq!(classify_sqlstate("42601"), SqlErrorKind::Syntax);
        assert_eq!(classify_sqlstate("42P01"), SqlErrorKind::Semantic);
        assert_eq!(classify_sqlstate("42703"), SqlErrorKind::Semantic);
    }

    #[test]
    fn test_classify_connection_and_unknown() {
        assert_eq!(classify_sqlstate("08006"), SqlErrorKind::Connection);
        assert_eq!(classify_sqlstate("XX000"), SqlErrorKind::Generic);
        assert_eq!(classify_sqlstate(""), SqlErrorKind::Generic);
    }

    #[test]
    fn test_schema_error_display() {
        assert_eq!(
            SchemaError::DuplicateColumn("id".into()).to_string(),
            "column \"id\" already exists"
        );
        assert_eq!(
            SchemaError::Locked("column \"id\"".into()).to_string(),
            "cannot modify locked column \"id\""
        );
    }

    #[test]
    fn test_statement_error_display() {
        let e = StatementError::KeyArity {
            expected: 2,
            actual: 1,
        };
        assert_eq!(e.to_string(), "expected 2 key value(s), got 1");
    }
}
