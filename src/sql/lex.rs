//! Quote-aware scanning over SQL text.
//!
//! Statement splitting and placeholder rewriting both need to know which
//! characters are code and which sit inside string literals, quoted
//! identifiers, comments, or dollar-quoted blocks. Naive splitting on `;`
//! breaks inside quoted text, so everything routes through one scanner.

/// Walk `sql`, invoking `f` with the byte position of every character that is
/// outside string literals, quoted identifiers, comments, and dollar quotes.
pub fn for_each_code_char(sql: &str, mut f: impl FnMut(usize, char)) {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let n = chars.len();
    let mut i = 0;
    while i < n {
        let (pos, c) = chars[i];
        match c {
            '\'' => {
                // String literal; '' is an escaped quote.
                i += 1;
                while i < n {
                    if chars[i].1 == '\'' {
                        if i + 1 < n && chars[i + 1].1 == '\'' {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '"' => {
                // Quoted identifier.
                i += 1;
                while i < n {
                    if chars[i].1 == '"' {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '-' if i + 1 < n && chars[i + 1].1 == '-' => {
                while i < n && chars[i].1 != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < n && chars[i + 1].1 == '*' => {
                // Block comments nest in postgres.
                let mut depth = 1;
                i += 2;
                while i < n && depth > 0 {
                    if chars[i].1 == '/' && i + 1 < n && chars[i + 1].1 == '*' {
                        depth += 1;
                        i += 2;
                    } else if chars[i].1 == '*' && i + 1 < n && chars[i + 1].1 == '/' {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
            }
            '$' => {
                // Possible dollar quote: $tag$ ... $tag$
                let mut j = i + 1;
                while j < n && (chars[j].1.is_alphanumeric() || chars[j].1 == '_') {
                    j += 1;
                }
                if j < n && chars[j].1 == '$' {
                    let open_end = chars[j].0 + 1;
                    let tag = &sql[pos..open_end];
                    if let Some(rel) = sql[open_end..].find(tag) {
                        let close_end = open_end + rel + tag.len();
                        while i < n && chars[i].0 < close_end {
                            i += 1;
                        }
                    } else {
                        // Unterminated; consume the rest.
                        i = n;
                    }
                } else {
                    f(pos, c);
                    i += 1;
                }
            }
            _ => {
                f(pos, c);
                i += 1;
            }
        }
    }
}

/// Byte positions of `?` placeholders outside literals and comments.
pub fn placeholder_positions(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    for_each_code_char(sql, |pos, c| {
        if c == '?' {
            positions.push(pos);
        }
    });
    positions
}

/// Rewrite each code-position `?` with the text produced by `f(ordinal)`;
/// ordinals start at 1.
pub fn replace_placeholders(sql: &str, mut f: impl FnMut(usize) -> String) -> String {
    let positions = placeholder_positions(sql);
    if positions.is_empty() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + positions.len() * 2);
    let mut last = 0;
    for (ordinal, &pos) in positions.iter().enumerate() {
        out.push_str(&sql[last..pos]);
        out.push_str(&f(ordinal + 1));
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    out
}

/// Split a multi-statement script on `;` boundaries, skipping string
/// literals, quoted identifiers, comments, and dollar-quoted bodies.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut boundaries = Vec::new();
    for_each_code_char(script, |pos, c| {
        if c == ';' {
            boundaries.push(pos);
        }
    });
    let mut statements = Vec::new();
    let mut start = 0;
    for pos in boundaries {
        let stmt = script[start..pos].trim();
        if !stmt.is_empty() {
            statements.push(stmt.to_string());
        }
        start = pos + 1;
    }
    let tail = script[start..].trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        let stmts = split_statements("SELECT 1; SELECT 2;");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_split_skips_string_literals() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("'a;b'"));
    }

    #[test]
    fn test_split_skips_quoted_identifiers() {
        let stmts = split_statements("SELECT \"we;ird\" FROM t; SELECT 2");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_split_skips_comments() {
        let script = "SELECT 1; -- trailing; comment\nSELECT 2 /* block; comment */; SELECT 3";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn test_split_nested_block_comment() {
        let stmts = split_statements("SELECT 1 /* outer /* inner; */ still; */; SELECT 2");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_split_dollar_quoted_body() {
        let script =
            "CREATE FUNCTION f() RETURNS int AS $$ BEGIN RETURN 1; END; $$ LANGUAGE plpgsql; SELECT 1";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("RETURN 1;"));
    }

    #[test]
    fn test_split_tagged_dollar_quote() {
        let script = "SELECT $body$x;y$body$; SELECT 2";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_escaped_quote_inside_literal() {
        let stmts = split_statements("SELECT 'it''s; fine'; SELECT 2");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_placeholder_positions_skip_literals() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = 'what?' AND c = ?";
        assert_eq!(placeholder_positions(sql).len(), 2);
    }

    #[test]
    fn test_replace_placeholders_numbering() {
        let sql = "a = ? AND b = ? AND c = '?'";
        let out = replace_placeholders(sql, |n| format!("${n}"));
        assert_eq!(out, "a = $1 AND b = $2 AND c = '?'");
    }

    #[test]
    fn test_replace_placeholders_empty() {
        assert_eq!(replace_placeholders("SELECT 1", |_| "$x".into()), "SELECT 1");
    }
}
