//! Validation for the admin raw-SQL escape hatch.
//!
//! This is a keyword heuristic, not a parser. It rejects more than strictly
//! necessary (a forbidden word inside a string literal is still rejected) and
//! relies on the executor for the remaining guarantees: a read-only
//! transaction that is always rolled back, a time budget and a row cap.
//! Raw statements are never tenant-scoped, so callers must sit behind an
//! upstream admin gate.

use crate::error::QueryError;
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_MAX_LENGTH: usize = 10_000;

/// Mutating, DDL and session-altering keywords, matched as whole words.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DELETE",
    "DROP",
    "TRUNCATE",
    "ALTER",
    "CREATE",
    "INSERT",
    "UPDATE",
    "REPLACE",
    "GRANT",
    "REVOKE",
    "EXECUTE",
    "EXEC",
    "CALL",
    "PROCEDURE",
    "FUNCTION",
    // SQLite session and file level statements.
    "PRAGMA",
    "ATTACH",
    "DETACH",
    "VACUUM",
    // SELECT ... INTO creates a table on some backends.
    "INTO",
];

static SELECT_PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();
static FORBIDDEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn select_prefix_regex() -> &'static Regex {
    SELECT_PREFIX_REGEX.get_or_init(|| Regex::new(r"(?i)^SELECT\b").unwrap())
}

fn forbidden_regex() -> &'static Regex {
    FORBIDDEN_REGEX.get_or_init(|| {
        // Identifier characters delimit words, so `updated_at` and `delete_flag`
        // are single tokens that never match UPDATE or DELETE.
        let pattern = format!(
            r"(?i)(?:^|[^A-Za-z0-9_])({})(?:$|[^A-Za-z0-9_])",
            FORBIDDEN_KEYWORDS.join("|")
        );
        Regex::new(&pattern).unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSqlGuard {
    max_length: usize,
}

impl Default for RawSqlGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl RawSqlGuard {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Returns the statement to execute: trimmed, without trailing `;`.
    pub fn validate(&self, sql: &str) -> Result<String, QueryError> {
        let statement = sql.trim();

        if !select_prefix_regex().is_match(statement) {
            return Err(reject("only SELECT statements are allowed".to_string()));
        }

        if let Some(captures) = forbidden_regex().captures(statement) {
            return Err(reject(format!(
                "forbidden keyword {}",
                captures[1].to_ascii_uppercase()
            )));
        }

        let length = statement.chars().count();
        if length > self.max_length {
            return Err(reject(format!(
                "statement is {} characters, maximum is {}",
                length, self.max_length
            )));
        }

        let statement = statement.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
        if statement.contains(';') {
            return Err(reject("multiple statements are not allowed".to_string()));
        }

        Ok(statement.to_string())
    }
}

fn reject(reason: String) -> QueryError {
    tracing::warn!(reason = %reason, "raw SQL rejected");
    QueryError::ForbiddenStatement { reason }
}
