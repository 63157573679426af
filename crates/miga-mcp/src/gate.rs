//! Read-only SQL admission check.
//!
//! The gate is a string heuristic, not a SQL parse: it requires a
//! leading `SELECT` and scans for destructive keywords as standalone
//! words, tolerating occurrences that sit inside quoted literals. It is
//! best-effort — a determined caller could still smuggle surprising SQL
//! past it, which is why it only ever fronts a read-only credential.

use crate::error::McpError;
use regex::Regex;

/// Keywords that fail a query outright when found outside quotes.
const DENYLIST: [&str; 8] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "GRANT", "REVOKE",
];

/// Validates that an incoming SQL string is a read-only SELECT.
pub struct QueryGate {
    patterns: Vec<(&'static str, Regex)>,
}

impl Default for QueryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryGate {
    /// Compile the denylist patterns. The patterns are fixed literals,
    /// so compilation cannot fail.
    pub fn new() -> Self {
        let patterns = DENYLIST
            .iter()
            .filter_map(|kw| {
                Regex::new(&format!(r"\b{kw}\b"))
                    .ok()
                    .map(|re| (*kw, re))
            })
            .collect();
        Self { patterns }
    }

    /// Return the query unchanged if it passes the read-only policy.
    pub fn check<'a>(&self, sql: &'a str) -> Result<&'a str, McpError> {
        // ASCII-only casefold keeps regex byte offsets valid for the
        // quote scan below.
        let upper = sql.trim().to_ascii_uppercase();

        if !upper.starts_with("SELECT") {
            return Err(McpError::PolicyViolation(
                "only SELECT statements are permitted".to_string(),
            ));
        }

        for (keyword, pattern) in &self.patterns {
            for m in pattern.find_iter(&upper) {
                if !inside_quotes(&upper, m.start()) {
                    return Err(McpError::PolicyViolation(format!(
                        "destructive keyword {keyword} is not allowed"
                    )));
                }
            }
        }

        Ok(sql)
    }
}

/// Quote-state scan up to `pos`: true when the position falls inside a
/// single- or double-quoted region. Heuristic only; does not understand
/// dollar quoting or escape sequences.
fn inside_quotes(s: &str, pos: usize) -> bool {
    let mut in_single = false;
    let mut in_double = false;

    for (idx, ch) in s.char_indices() {
        if idx >= pos {
            break;
        }
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ => {}
        }
    }

    in_single || in_double
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> QueryGate {
        QueryGate::new()
    }

    fn is_policy_violation(result: Result<&str, McpError>) -> bool {
        matches!(result, Err(McpError::PolicyViolation(_)))
    }

    #[test]
    fn accepts_plain_select() {
        assert!(gate().check("SELECT * FROM products").is_ok());
    }

    #[test]
    fn accepts_select_with_leading_whitespace_and_mixed_case() {
        assert!(gate().check("  \n select id from orders ").is_ok());
    }

    #[test]
    fn rejects_non_select_statements() {
        for sql in [
            "INSERT INTO orders VALUES (1)",
            "update orders set status = 'done'",
            "DELETE FROM orders",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "EXPLAIN SELECT 1",
            "",
        ] {
            assert!(is_policy_violation(gate().check(sql)), "accepted: {sql:?}");
        }
    }

    #[test]
    fn rejects_denylisted_keyword_inside_select() {
        assert!(is_policy_violation(
            gate().check("SELECT 1; DROP TABLE orders")
        ));
        assert!(is_policy_violation(gate().check(
            "SELECT * FROM orders; DELETE FROM orders WHERE true"
        )));
    }

    #[test]
    fn word_boundaries_do_not_reject_substrings() {
        assert!(
            gate()
                .check("SELECT updated_at, grantee_name FROM orders")
                .is_ok()
        );
        assert!(gate().check("SELECT * FROM insertions").is_ok());
    }

    #[test]
    fn keyword_inside_quoted_literal_is_tolerated() {
        assert!(
            gate()
                .check("SELECT * FROM logs WHERE note = 'please DELETE me'")
                .is_ok()
        );
        assert!(
            gate()
                .check(r#"SELECT * FROM logs WHERE note = "DROP it""#)
                .is_ok()
        );
    }

    #[test]
    fn quoted_and_unquoted_occurrences_of_same_keyword_still_reject() {
        assert!(is_policy_violation(gate().check(
            "SELECT 'DELETE' AS label; DELETE FROM orders"
        )));
    }
}
