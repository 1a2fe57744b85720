use std::fmt;

/// Hard failures. Every variant rejects the whole request; nothing is executed.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    InvalidTableOrColumn {
        target: SelectorTarget,
        name: String,
        valid: Vec<String>,
    },
    InvalidSortField {
        field: String,
        valid: Vec<String>,
    },
    UnsupportedOperator {
        operator: String,
        valid: Vec<String>,
    },
    InvalidFilterValue {
        column: String,
        message: String,
    },
    ForbiddenStatement {
        reason: String,
    },
    QueryTimeout {
        budget_ms: u64,
    },
    MalformedFilter {
        message: String,
    },
    FilterTooComplex {
        depth: usize,
        nodes: usize,
    },
    Execution {
        message: String,
    },
}

/// Which token of an ad-hoc request failed the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorTarget {
    Table,
    Column,
}

impl fmt::Display for SelectorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorTarget::Table => write!(f, "table"),
            SelectorTarget::Column => write!(f, "column"),
        }
    }
}

impl QueryError {
    /// Stable machine-readable code, used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::InvalidTableOrColumn { .. } => "invalid_table_or_column",
            QueryError::InvalidSortField { .. } => "invalid_sort_field",
            QueryError::UnsupportedOperator { .. } => "unsupported_operator",
            QueryError::InvalidFilterValue { .. } => "invalid_filter_value",
            QueryError::ForbiddenStatement { .. } => "forbidden_statement",
            QueryError::QueryTimeout { .. } => "query_timeout",
            QueryError::MalformedFilter { .. } => "malformed_filter",
            QueryError::FilterTooComplex { .. } => "filter_too_complex",
            QueryError::Execution { .. } => "execution_failed",
        }
    }

    /// Names the caller could have used instead, when there is a closed set of them.
    pub fn valid_alternatives(&self) -> Option<&[String]> {
        match self {
            QueryError::InvalidTableOrColumn { valid, .. }
            | QueryError::InvalidSortField { valid, .. }
            | QueryError::UnsupportedOperator { valid, .. } => Some(valid),
            _ => None,
        }
    }

    /// Timeouts and execution failures may succeed on resubmission; rejections never will.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueryError::QueryTimeout { .. } | QueryError::Execution { .. }
        )
    }

    pub fn execution(err: impl fmt::Display) -> Self {
        QueryError::Execution {
            message: err.to_string(),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidTableOrColumn {
                target,
                name,
                valid,
            } => write!(
                f,
                "Invalid {} '{}'. Must be one of: {}",
                target,
                name,
                valid.join(", ")
            ),
            QueryError::InvalidSortField { field, valid } => write!(
                f,
                "Cannot sort by '{}'. Must be one of: {}",
                field,
                valid.join(", ")
            ),
            QueryError::UnsupportedOperator { operator, valid } => write!(
                f,
                "Unsupported operator '{}'. Must be one of: {}",
                operator,
                valid.join(", ")
            ),
            QueryError::InvalidFilterValue { column, message } => {
                write!(f, "Invalid value for column '{}': {}", column, message)
            }
            QueryError::ForbiddenStatement { reason } => {
                write!(f, "Statement rejected: {}", reason)
            }
            QueryError::QueryTimeout { budget_ms } => {
                write!(f, "Query timed out after {} ms", budget_ms)
            }
            QueryError::MalformedFilter { message } => write!(f, "Malformed filter: {}", message),
            QueryError::FilterTooComplex { depth, nodes } => write!(
                f,
                "Filter too complex: depth {} and {} nodes exceed the allowed size",
                depth, nodes
            ),
            QueryError::Execution { message } => write!(f, "Query execution failed: {}", message),
        }
    }
}

impl std::error::Error for QueryError {}

/// Non-fatal problems found while resolving a filter tree. The offending
/// condition is dropped or matches nothing; the request still succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterIssue {
    UnknownField {
        node_id: String,
        field: String,
    },
    IllegalOperator {
        node_id: String,
        field: String,
        operator: String,
    },
    MalformedBetween {
        node_id: String,
        field: String,
    },
}

impl FilterIssue {
    pub fn node_id(&self) -> &str {
        match self {
            FilterIssue::UnknownField { node_id, .. }
            | FilterIssue::IllegalOperator { node_id, .. }
            | FilterIssue::MalformedBetween { node_id, .. } => node_id,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FilterIssue::UnknownField { field, .. }
            | FilterIssue::IllegalOperator { field, .. }
            | FilterIssue::MalformedBetween { field, .. } => field,
        }
    }

    /// The rejected operator, for issues about one.
    pub fn operator(&self) -> Option<&str> {
        match self {
            FilterIssue::IllegalOperator { operator, .. } => Some(operator),
            _ => None,
        }
    }
}

impl fmt::Display for FilterIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterIssue::UnknownField { node_id, field } => {
                write!(f, "UnknownField: node {} references '{}'", node_id, field)
            }
            FilterIssue::IllegalOperator {
                node_id,
                field,
                operator,
            } => write!(
                f,
                "IllegalOperator: node {} uses '{}' on field '{}'",
                node_id, operator, field
            ),
            FilterIssue::MalformedBetween { node_id, field } => write!(
                f,
                "MalformedBetween: node {} on field '{}' is missing a bound",
                node_id, field
            ),
        }
    }
}
