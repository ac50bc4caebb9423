//! Database-product strategy layer.
//!
//! A [`SqlDialect`] captures one product's syntax differences: identifier
//! quoting, pagination, boolean literals, string helpers, DDL generation,
//! and script splitting. The engine asks a dialect rather than hard-coding
//! product syntax; an operation a dialect cannot express returns a typed
//! `Unsupported` error instead of wrong SQL.

use crate::error::{GridError, GridResult};
use crate::schema::change::{ChangeOp, TableChange};
use crate::sql::fragment::SqlFragment;
use crate::sql::lex;
use crate::types::SqlType;

pub trait SqlDialect: Send + Sync {
    fn product_name(&self) -> &'static str;

    fn is_reserved(&self, word: &str) -> bool;

    /// Quote `name` when required (reserved word, non-simple identifier, or
    /// mixed case); pass simple lowercase identifiers through untouched.
    fn quote_identifier(&self, name: &str) -> String {
        if needs_quoting(name) || self.is_reserved(name) {
            format!("\"{}\"", name.replace('"', "\"\""))
        } else {
            name.to_string()
        }
    }

    fn boolean_literal(&self, value: bool) -> &'static str;

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn concat_operator(&self) -> &'static str {
        "||"
    }

    fn char_length_function(&self) -> &'static str;

    fn substring(&self, expr: &str, start: &str, length: &str) -> String;

    fn string_position(&self, needle: &str, haystack: &str) -> String;

    /// Whether the product supports a native row offset. When false, the
    /// selector emulates offsets generically by over-fetching and discarding
    /// rows; dialects never duplicate that fallback.
    fn supports_offset(&self) -> bool;

    /// Append pagination syntax to a generated statement.
    fn limit_rows(
        &self,
        frag: &mut SqlFragment,
        max_rows: Option<u64>,
        offset: u64,
    ) -> GridResult<()>;

    /// Rewrite structural `?` placeholders into the driver's positional form.
    fn render_placeholders(&self, sql: &str) -> String;

    /// DDL type name for a column kind.
    fn sql_type_name(&self, t: SqlType) -> GridResult<&'static str> {
        t.ddl_name().ok_or_else(|| GridError::Unsupported {
            dialect: self.product_name(),
            operation: format!("DDL for column type {t}"),
        })
    }

    /// Ordered DDL statements realizing a table change.
    fn change_statements(&self, change: &TableChange) -> GridResult<Vec<String>>;

    /// Split a multi-statement script at statement boundaries, skipping
    /// string literals and comments.
    fn split_script(&self, script: &str) -> Vec<String> {
        lex::split_statements(script)
    }
}

/// PostgreSQL reserved words, lowercase and sorted for binary search.
const PG_RESERVED: &[&str] = &[
    "all",
    "analyse",
    "analyze",
    "and",
    "any",
    "array",
    "as",
    "asc",
    "asymmetric",
    "both",
    "case",
    "cast",
    "check",
    "collate",
    "column",
    "constraint",
    "create",
    "current_catalog",
    "current_date",
    "current_role",
    "current_time",
    "current_timestamp",
    "current_user",
    "default",
    "deferrable",
    "desc",
    "distinct",
    "do",
    "else",
    "end",
    "except",
    "false",
    "fetch",
    "for",
    "foreign",
    "from",
    "grant",
    "group",
    "having",
    "in",
    "initially",
    "intersect",
    "into",
    "lateral",
    "leading",
    "limit",
    "localtime",
    "localtimestamp",
    "not",
    "null",
    "offset",
    "on",
    "only",
    "or",
    "order",
    "placing",
    "primary",
    "references",
    "returning",
    "select",
    "session_user",
    "some",
    "symmetric",
    "table",
    "then",
    "to",
    "trailing",
    "true",
    "union",
    "unique",
    "user",
    "using",
    "variadic",
    "when",
    "where",
    "window",
    "with",
];

fn needs_quoting(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return true,
    }
    !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// The reference dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn product_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn is_reserved(&self, word: &str) -> bool {
        PG_RESERVED
            .binary_search(&word.to_ascii_lowercase().as_str())
            .is_ok()
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn char_length_function(&self) -> &'static str {
        "char_length"
    }

    fn substring(&self, expr: &str, start: &str, length: &str) -> String {
        format!("substring({expr} from {start} for {length})")
    }

    fn string_position(&self, needle: &str, haystack: &str) -> String {
        format!("position({needle} in {haystack})")
    }

    fn supports_offset(&self) -> bool {
        true
    }

    fn limit_rows(
        &self,
        frag: &mut SqlFragment,
        max_rows: Option<u64>,
        offset: u64,
    ) -> GridResult<()> {
        if let Some(max) = max_rows {
            frag.append(format!("\nLIMIT {max}"));
        }
        if offset > 0 {
            frag.append(format!("\nOFFSET {offset}"));
        }
        Ok(())
    }

    fn render_placeholders(&self, sql: &str) -> String {
        lex::replace_placeholders(sql, |n| format!("${n}"))
    }

    fn change_statements(&self, change: &TableChange) -> GridResult<Vec<String>> {
        let table = self.qualified_table(change);
        let mut statements = Vec::new();
        for op in &change.ops {
            match op {
                ChangeOp::CreateTable { columns, pk } => {
                    let mut defs = Vec::with_capacity(columns.len() + 1);
                    for col in columns {
                        defs.push(self.column_def(col)?);
                    }
                    if !pk.is_empty() {
                        let cols: Vec<String> =
                            pk.iter().map(|c| self.quote_identifier(c)).collect();
                        defs.push(format!("PRIMARY KEY ({})", cols.join(", ")));
                    }
                    statements.push(format!("CREATE TABLE {table} ({})", defs.join(", ")));
                }
                ChangeOp::DropTable => {
                    statements.push(format!("DROP TABLE {table}"));
                }
                ChangeOp::AddColumns(columns) => {
                    for col in columns {
                        statements.push(format!(
                            "ALTER TABLE {table} ADD COLUMN {}",
                            self.column_def(col)?
                        ));
                    }
                }
                ChangeOp::DropColumns(names) => {
                    for name in names {
                        statements.push(format!(
                            "ALTER TABLE {table} DROP COLUMN {}",
                            self.quote_identifier(name)
                        ));
                    }
                }
                ChangeOp::RenameColumns(renames) => {
                    for (from, to) in renames {
                        statements.push(format!(
                            "ALTER TABLE {table} RENAME COLUMN {} TO {}",
                            self.quote_identifier(from),
                            self.quote_identifier(to)
                        ));
                    }
                }
                ChangeOp::ResizeColumns(resizes) => {
                    for (name, size) in resizes {
                        statements.push(format!(
                            "ALTER TABLE {table} ALTER COLUMN {} TYPE VARCHAR({size})",
                            self.quote_identifier(name)
                        ));
                    }
                }
                ChangeOp::AddIndexes(indexes) => {
                    for idx in indexes {
                        let cols: Vec<String> =
                            idx.columns.iter().map(|c| self.quote_identifier(c)).collect();
                        let unique = if idx.unique { "UNIQUE " } else { "" };
                        statements.push(format!(
                            "CREATE {unique}INDEX {} ON {table} ({})",
                            self.quote_identifier(&idx.name),
                            cols.join(", ")
                        ));
                    }
                }
                ChangeOp::DropIndexes(names) => {
                    for name in names {
                        statements.push(format!("DROP INDEX {}", self.quote_identifier(name)));
                    }
                }
                ChangeOp::AddConstraints(constraints) => {
                    for c in constraints {
                        statements.push(format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {} {}",
                            self.quote_identifier(&c.name),
                            c.definition
                        ));
                    }
                }
                ChangeOp::DropConstraints(names) => {
                    for name in names {
                        statements.push(format!(
                            "ALTER TABLE {table} DROP CONSTRAINT {}",
                            self.quote_identifier(name)
                        ));
                    }
                }
            }
        }
        Ok(statements)
    }
}

impl PostgresDialect {
    fn qualified_table(&self, change: &TableChange) -> String {
        match &change.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&change.table)
            ),
            None => self.quote_identifier(&change.table),
        }
    }

    fn column_def(&self, col: &crate::schema::change::ColumnSpec) -> GridResult<String> {
        let type_name = self.sql_type_name(col.sql_type)?;
        let mut def = format!("{} {type_name}", self.quote_identifier(&col.name));
        if col.sql_type == SqlType::Varchar {
            if let Some(size) = col.size {
                def = format!(
                    "{} {type_name}({size})",
                    self.quote_identifier(&col.name)
                );
            }
        }
        if !col.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &col.default {
            def.push_str(&format!(" DEFAULT {default}"));
        }
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::change::{ColumnSpec, ConstraintSpec, IndexSpec};

    fn pg() -> PostgresDialect {
        PostgresDialect
    }

    #[test]
    fn test_reserved_words() {
        assert!(pg().is_reserved("select"));
        assert!(pg().is_reserved("SELECT"));
        assert!(pg().is_reserved("offset"));
        assert!(!pg().is_reserved("amount"));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(pg().quote_identifier("amount"), "amount");
        assert_eq!(pg().quote_identifier("user"), "\"user\"");
        assert_eq!(pg().quote_identifier("MixedCase"), "\"MixedCase\"");
        assert_eq!(pg().quote_identifier("has space"), "\"has space\"");
        assert_eq!(pg().quote_identifier("has\"quote"), "\"has\"\"quote\"");
    }

    #[test]
    fn test_boolean_and_string_literals() {
        assert_eq!(pg().boolean_literal(true), "TRUE");
        assert_eq!(pg().boolean_literal(false), "FALSE");
        assert_eq!(pg().string_literal("o'neil"), "'o''neil'");
    }

    #[test]
    fn test_limit_rows_native() {
        let mut frag = SqlFragment::from("SELECT * FROM t");
        pg().limit_rows(&mut frag, Some(10), 20).unwrap();
        assert_eq!(frag.sql(), "SELECT * FROM t\nLIMIT 10\nOFFSET 20");

        let mut frag = SqlFragment::from("SELECT * FROM t");
        pg().limit_rows(&mut frag, None, 0).unwrap();
        assert_eq!(frag.sql(), "SELECT * FROM t");
    }

    #[test]
    fn test_render_placeholders() {
        let out = pg().render_placeholders("a = ? AND b = ? AND c = '?'");
        assert_eq!(out, "a = $1 AND b = $2 AND c = '?'");
    }

    #[test]
    fn test_create_table_statements() {
        let change = TableChange {
            schema: Some("lists".into()),
            table: "orders".into(),
            ops: vec![ChangeOp::CreateTable {
                columns: vec![
                    ColumnSpec {
                        name: "id".into(),
                        sql_type: SqlType::Integer,
                        size: None,
                        nullable: false,
                        default: None,
                    },
                    ColumnSpec {
                        name: "name".into(),
                        sql_type: SqlType::Varchar,
                        size: Some(100),
                        nullable: true,
                        default: None,
                    },
                ],
                pk: vec!["id".into()],
            }],
        };
        let stmts = pg().change_statements(&change).unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            stmts[0],
            "CREATE TABLE lists.orders (id INTEGER NOT NULL, name VARCHAR(100), PRIMARY KEY (id))"
        );
    }

    #[test]
    fn test_alter_statements_ordered() {
        let change = TableChange {
            schema: None,
            table: "t".into(),
            ops: vec![
                ChangeOp::RenameColumns(vec![("old".into(), "new".into())]),
                ChangeOp::ResizeColumns(vec![("name".into(), 255)]),
                ChangeOp::AddIndexes(vec![IndexSpec {
                    name: "t_name_idx".into(),
                    columns: vec!["name".into()],
                    unique: true,
                }]),
                ChangeOp::AddConstraints(vec![ConstraintSpec {
                    name: "t_pos".into(),
                    definition: "CHECK (amount > 0)".into(),
                }]),
            ],
        };
        let stmts = pg().change_statements(&change).unwrap();
        assert_eq!(
            stmts,
            vec![
                "ALTER TABLE t RENAME COLUMN old TO new",
                "ALTER TABLE t ALTER COLUMN name TYPE VARCHAR(255)",
                "CREATE UNIQUE INDEX t_name_idx ON t (name)",
                "ALTER TABLE t ADD CONSTRAINT t_pos CHECK (amount > 0)",
            ]
        );
    }

    #[test]
    fn test_ddl_for_other_type_is_unsupported() {
        let err = pg().sql_type_name(SqlType::Other).unwrap_err();
        assert!(matches!(err, GridError::Unsupported { .. }));
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(
            pg().substring("name", "1", "3"),
            "substring(name from 1 for 3)"
        );
        assert_eq!(pg().string_position("'a'", "name"), "position('a' in name)");
        assert_eq!(pg().concat_operator(), "||");
    }
}
