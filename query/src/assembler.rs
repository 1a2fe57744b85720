//! Flat, allow-listed SELECT builder for power users.
//!
//! Every identifier goes through [`crate::selector`]; every value, including
//! the tenant id and the clamped limit, is a bound parameter.

use crate::error::QueryError;
use crate::relational::SortDirection;
use crate::selector::select_table;
use crate::value::{SqlValue, Statement};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<SpecFilter>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order_direction: Option<SortDirection>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecFilter {
    pub column: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum AdHocOperator {
    Equals,
    NotEquals,
    Greater,
    Less,
    Like,
}

impl AdHocOperator {
    pub fn sql(self) -> &'static str {
        match self {
            AdHocOperator::Equals => "=",
            AdHocOperator::NotEquals => "!=",
            AdHocOperator::Greater => ">",
            AdHocOperator::Less => "<",
            AdHocOperator::Like => "LIKE",
        }
    }

    fn parse(name: &str) -> Result<Self, QueryError> {
        AdHocOperator::from_str(name).map_err(|_| QueryError::UnsupportedOperator {
            operator: name.to_string(),
            valid: AdHocOperator::iter().map(|op| op.to_string()).collect(),
        })
    }
}

/// Server-side result size bounds, independent of what the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl QueryLimits {
    pub fn clamp(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

pub fn assemble(
    spec: &QuerySpec,
    tenant_id: &str,
    limits: &QueryLimits,
) -> Result<Statement, QueryError> {
    let table = select_table(&spec.table)?;

    let columns = if spec.columns.is_empty() {
        table.columns.to_vec()
    } else {
        table.columns(&spec.columns)?
    };
    let order_by = spec
        .order_by
        .as_deref()
        .map(|name| table.column(name))
        .transpose()?;

    let mut params = vec![SqlValue::String(tenant_id.to_string())];
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        columns.join(", "),
        table.table,
        table.tenant_column
    );

    for filter in &spec.filters {
        let column = table.column(&filter.column)?;
        let operator = AdHocOperator::parse(&filter.operator)?;
        sql.push_str(" AND ");
        sql.push_str(&filter_clause(column, operator, &filter.value, &mut params)?);
    }

    if let Some(column) = order_by {
        let direction = spec.order_direction.unwrap_or_default();
        sql.push_str(&format!(" ORDER BY {} {}", column, direction.sql()));
    }

    params.push(SqlValue::Integer(limits.clamp(spec.limit)));
    sql.push_str(&format!(" LIMIT ${}", params.len()));

    Ok(Statement { sql, params })
}

fn filter_clause(
    column: &str,
    operator: AdHocOperator,
    value: &Value,
    params: &mut Vec<SqlValue>,
) -> Result<String, QueryError> {
    let invalid = |message: &str| QueryError::InvalidFilterValue {
        column: column.to_string(),
        message: message.to_string(),
    };

    let bound = match (value, operator) {
        (Value::Null, AdHocOperator::Equals) => return Ok(format!("{} IS NULL", column)),
        (Value::Null, AdHocOperator::NotEquals) => return Ok(format!("{} IS NOT NULL", column)),
        (Value::Null, _) => return Err(invalid("null is only valid with equals or not_equals")),
        (Value::String(s), _) => SqlValue::String(s.clone()),
        (_, AdHocOperator::Like) => return Err(invalid("like requires a string pattern")),
        (Value::Bool(b), _) => SqlValue::Bool(*b),
        (Value::Number(n), _) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n
                .as_f64()
                .map(SqlValue::Float)
                .ok_or_else(|| invalid("number out of range"))?,
        },
        (Value::Array(_) | Value::Object(_), _) => {
            return Err(invalid("value must be a string, number, boolean or null"))
        }
    };

    params.push(bound);
    Ok(format!("{} {} ${}", column, operator.sql(), params.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> QuerySpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_assembles_parameterized_select() {
        let statement = assemble(
            &spec(json!({
                "table": "invoices",
                "columns": ["invoice_number", "amount"],
                "filters": [
                    {"column": "status", "operator": "not_equals", "value": "cancelled"},
                    {"column": "amount", "operator": "greater", "value": 99.5},
                    {"column": "invoice_number", "operator": "like", "value": "INV-2024-%"}
                ],
                "orderBy": "amount",
                "orderDirection": "desc",
                "limit": 20
            })),
            "tenant-a",
            &QueryLimits::default(),
        )
        .unwrap();

        assert_eq!(
            statement.sql,
            "SELECT invoice_number, amount FROM invoices WHERE tenant_id = $1 \
             AND status != $2 AND amount > $3 AND invoice_number LIKE $4 \
             ORDER BY amount DESC LIMIT $5"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::String("tenant-a".into()),
                SqlValue::String("cancelled".into()),
                SqlValue::Float(99.5),
                SqlValue::String("INV-2024-%".into()),
                SqlValue::Integer(20),
            ]
        );
    }

    #[test]
    fn test_empty_columns_select_whole_allow_list() {
        let statement = assemble(
            &spec(json!({"table": "cash_accounts"})),
            "t",
            &QueryLimits::default(),
        )
        .unwrap();
        assert!(statement.sql.starts_with(
            "SELECT id, name, account_type, balance, currency, is_active, opened_at FROM cash_accounts"
        ));
        assert_eq!(statement.params.last(), Some(&SqlValue::Integer(DEFAULT_LIMIT)));
    }

    #[test]
    fn test_limit_is_clamped() {
        let limits = QueryLimits::default();
        assert_eq!(limits.clamp(None), DEFAULT_LIMIT);
        assert_eq!(limits.clamp(Some(1_000_000)), MAX_LIMIT);
        assert_eq!(limits.clamp(Some(0)), 1);
        assert_eq!(limits.clamp(Some(-5)), 1);

        let statement = assemble(
            &spec(json!({"table": "clients", "columns": ["id"], "limit": 999999})),
            "t",
            &QueryLimits {
                default_limit: 10,
                max_limit: 50,
            },
        )
        .unwrap();
        assert_eq!(statement.params.last(), Some(&SqlValue::Integer(50)));
    }

    #[test]
    fn test_column_rejected_in_every_position() {
        let limits = QueryLimits::default();
        let positions = [
            json!({"table": "clients", "columns": ["tax_id"]}),
            json!({"table": "clients", "filters": [{"column": "tax_id", "operator": "equals", "value": "x"}]}),
            json!({"table": "clients", "orderBy": "tax_id"}),
        ];
        for body in positions {
            for op in ["equals", "not_equals", "greater", "less", "like"] {
                let mut body = body.clone();
                if let Some(filters) = body.get_mut("filters") {
                    filters[0]["operator"] = json!(op);
                }
                let err = assemble(&spec(body.clone()), "t", &limits).unwrap_err();
                assert_eq!(err.kind(), "invalid_table_or_column", "{}", body);
            }
        }
    }

    #[test]
    fn test_tenant_column_is_not_selectable() {
        let err = assemble(
            &spec(json!({"table": "clients", "columns": ["tenant_id"]})),
            "t",
            &QueryLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_table_or_column");
    }

    #[test]
    fn test_unknown_operator_lists_vocabulary() {
        let err = assemble(
            &spec(json!({"table": "clients", "filters": [{"column": "name", "operator": "in", "value": "a"}]})),
            "t",
            &QueryLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "unsupported_operator");
        assert_eq!(
            err.valid_alternatives().unwrap(),
            &["equals", "not_equals", "greater", "less", "like"]
        );
    }

    #[test]
    fn test_null_values() {
        let limits = QueryLimits::default();
        let statement = assemble(
            &spec(json!({"table": "invoices", "columns": ["id"], "filters": [
                {"column": "paid_at", "operator": "equals", "value": null},
                {"column": "due_date", "operator": "not_equals"}
            ]})),
            "t",
            &limits,
        )
        .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT id FROM invoices WHERE tenant_id = $1 AND paid_at IS NULL AND due_date IS NOT NULL LIMIT $2"
        );

        let err = assemble(
            &spec(json!({"table": "invoices", "filters": [{"column": "amount", "operator": "greater", "value": null}]})),
            "t",
            &limits,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_filter_value");
    }

    #[test]
    fn test_structured_values_rejected() {
        let limits = QueryLimits::default();
        for value in [json!(["a"]), json!({"$gt": 1})] {
            let err = assemble(
                &spec(json!({"table": "clients", "filters": [{"column": "name", "operator": "equals", "value": value}]})),
                "t",
                &limits,
            )
            .unwrap_err();
            assert_eq!(err.kind(), "invalid_filter_value");
        }
        let err = assemble(
            &spec(json!({"table": "clients", "filters": [{"column": "name", "operator": "like", "value": 5}]})),
            "t",
            &limits,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_filter_value");
    }

    #[test]
    fn test_injection_in_values_stays_bound() {
        let statement = assemble(
            &spec(json!({"table": "clients", "columns": ["id"], "filters": [
                {"column": "name", "operator": "equals", "value": "x' OR 1=1 --"}
            ]})),
            "t",
            &QueryLimits::default(),
        )
        .unwrap();
        assert!(!statement.sql.contains("OR 1=1"));
        assert_eq!(statement.params[1], SqlValue::String("x' OR 1=1 --".into()));
    }
}
