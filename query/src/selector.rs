//! Static allow-list of tables and columns reachable from the ad-hoc query
//! builder. Deliberately not derived from the live schema: a column added to
//! a table stays invisible here until it is listed.

use crate::error::{QueryError, SelectorTarget};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

fn identifier_regex() -> &'static Regex {
    IDENTIFIER_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

pub fn is_safe_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAllowList {
    pub table: &'static str,
    #[serde(skip)]
    pub tenant_column: &'static str,
    pub columns: &'static [&'static str],
}

static ALLOWED_TABLES: &[TableAllowList] = &[
    TableAllowList {
        table: "clients",
        tenant_column: "tenant_id",
        columns: &[
            "id",
            "name",
            "email",
            "status",
            "plan",
            "monthly_value",
            "auto_renew",
            "created_at",
        ],
    },
    TableAllowList {
        table: "invoices",
        tenant_column: "tenant_id",
        columns: &[
            "id",
            "invoice_number",
            "client_id",
            "status",
            "amount",
            "currency",
            "issue_date",
            "due_date",
            "paid_at",
        ],
    },
    TableAllowList {
        table: "licenses",
        tenant_column: "tenant_id",
        columns: &[
            "id",
            "license_key",
            "client_id",
            "product",
            "status",
            "seats",
            "auto_renew",
            "expires_at",
        ],
    },
    TableAllowList {
        table: "cash_accounts",
        tenant_column: "tenant_id",
        columns: &[
            "id",
            "name",
            "account_type",
            "balance",
            "currency",
            "is_active",
            "opened_at",
        ],
    },
    TableAllowList {
        table: "cash_transactions",
        tenant_column: "tenant_id",
        columns: &[
            "id",
            "account_id",
            "direction",
            "category",
            "description",
            "amount",
            "reconciled",
            "occurred_at",
        ],
    },
];

pub fn allowed_tables() -> &'static [TableAllowList] {
    ALLOWED_TABLES
}

fn table_names() -> Vec<String> {
    ALLOWED_TABLES.iter().map(|t| t.table.to_string()).collect()
}

pub fn select_table(name: &str) -> Result<&'static TableAllowList, QueryError> {
    let found = is_safe_identifier(name)
        .then(|| ALLOWED_TABLES.iter().find(|t| t.table == name))
        .flatten();
    found.ok_or_else(|| {
        tracing::warn!(table = %name, "rejected table outside allow-list");
        QueryError::InvalidTableOrColumn {
            target: SelectorTarget::Table,
            name: name.to_string(),
            valid: table_names(),
        }
    })
}

impl TableAllowList {
    /// Returns the allow-listed spelling of `name`, which is what goes into SQL.
    pub fn column(&self, name: &str) -> Result<&'static str, QueryError> {
        let found = is_safe_identifier(name)
            .then(|| self.columns.iter().copied().find(|c| *c == name))
            .flatten();
        found.ok_or_else(|| {
            tracing::warn!(table = %self.table, column = %name, "rejected column outside allow-list");
            QueryError::InvalidTableOrColumn {
                target: SelectorTarget::Column,
                name: name.to_string(),
                valid: self.columns.iter().map(|c| c.to_string()).collect(),
            }
        })
    }

    /// Validates a whole list; the first offending name rejects the request.
    pub fn columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&'static str>, QueryError> {
        names.iter().map(|n| self.column(n.as_ref())).collect()
    }
}
