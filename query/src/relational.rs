//! Compiles a filter tree into a parameterized, tenant-scoped SQL predicate.
//!
//! Only registry columns appear in the generated text, and every value is a
//! bound `$n` parameter. Placeholder `$1` is always the tenant id.

use crate::error::{FilterIssue, QueryError};
use crate::plan::{resolve, Operand, PatternKind, Plan, Test};
use crate::registry::ResourceSchema;
use crate::tree::FilterGroup;
use crate::value::{escape_like, SqlValue, Statement, DAY_FORMAT};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Requested ordering, by field key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A tenant-scoped predicate. It can only be built by [`compile`], which
/// always emits the tenant equality first.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    schema: &'static ResourceSchema,
    where_sql: String,
    params: Vec<SqlValue>,
    order_by: Option<String>,
    issues: Vec<FilterIssue>,
}

impl CompiledPredicate {
    pub fn where_sql(&self) -> &str {
        &self.where_sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn order_by_sql(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn issues(&self) -> &[FilterIssue] {
        &self.issues
    }

    /// Full listing statement. Registry columns are aliased to their field
    /// keys, so rows come back shaped like in-memory records.
    pub fn select(&self, limit: i64, offset: i64) -> Statement {
        let columns = self
            .schema
            .fields
            .iter()
            .map(|f| format!("{} AS \"{}\"", f.column, f.key))
            .collect::<Vec<_>>()
            .join(", ");

        let mut params = self.params.clone();
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            columns, self.schema.table, self.where_sql
        );
        if let Some(order_by) = &self.order_by {
            sql.push(' ');
            sql.push_str(order_by);
        }
        params.push(SqlValue::Integer(limit));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
        params.push(SqlValue::Integer(offset));
        sql.push_str(&format!(" OFFSET ${}", params.len()));

        Statement { sql, params }
    }
}

pub fn compile(
    group: &FilterGroup,
    schema: &'static ResourceSchema,
    tenant_id: &str,
    sort: Option<&SortSpec>,
) -> Result<CompiledPredicate, QueryError> {
    group.check_complexity()?;

    let order_by = match sort {
        Some(sort) => {
            let field = schema
                .field(&sort.field)
                .ok_or_else(|| QueryError::InvalidSortField {
                    field: sort.field.clone(),
                    valid: schema.field_keys(),
                })?;
            Some(format!("ORDER BY {} {}", field.column, sort.direction.sql()))
        }
        None => None,
    };

    let resolved = resolve(group, schema.fields);
    let mut writer = SqlWriter::default();
    let tenant = writer.bind(SqlValue::String(tenant_id.to_string()));
    let mut where_sql = format!("{} = {}", schema.tenant_column, tenant);
    if resolved.plan != Plan::Const(true) {
        where_sql.push_str(" AND ");
        where_sql.push_str(&writer.render(&resolved.plan));
    }

    Ok(CompiledPredicate {
        schema,
        where_sql,
        params: writer.params,
        order_by,
        issues: resolved.issues,
    })
}

#[derive(Default)]
struct SqlWriter {
    params: Vec<SqlValue>,
}

impl SqlWriter {
    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn bind_day(&mut self, day: NaiveDate) -> String {
        self.bind(SqlValue::String(day.format(DAY_FORMAT).to_string()))
    }

    fn render(&mut self, plan: &Plan<'_>) -> String {
        match plan {
            Plan::Const(true) => "1 = 1".to_string(),
            Plan::Const(false) => "1 = 0".to_string(),
            Plan::Test(test) => self.render_test(test),
            Plan::All(parts) => self.render_joined(parts, " AND "),
            Plan::Any(parts) => self.render_joined(parts, " OR "),
        }
    }

    fn render_joined(&mut self, parts: &[Plan<'_>], separator: &str) -> String {
        let rendered: Vec<String> = parts.iter().map(|p| self.render(p)).collect();
        format!("({})", rendered.join(separator))
    }

    fn render_test(&mut self, test: &Test<'_>) -> String {
        let column = test.field.column;
        match &test.operand {
            Operand::Text(text) => {
                let p = self.bind(SqlValue::String(text.clone()));
                format!("LOWER({}) = {}", column, p)
            }
            Operand::TextSet(items) => {
                let list = Value::from(items.clone()).to_string();
                let p = self.bind(SqlValue::String(list));
                format!("LOWER({}) IN (SELECT value FROM json_each({}))", column, p)
            }
            Operand::Pattern(kind, needle) => {
                let escaped = escape_like(needle);
                let pattern = match kind {
                    PatternKind::Contains => format!("%{}%", escaped),
                    PatternKind::Prefix => format!("{}%", escaped),
                    PatternKind::Suffix => format!("%{}", escaped),
                };
                let p = self.bind(SqlValue::String(pattern));
                format!("LOWER({}) LIKE {} ESCAPE '\\'", column, p)
            }
            Operand::Flag(flag) => {
                let p = self.bind(SqlValue::Bool(*flag));
                format!("{} = {}", column, p)
            }
            Operand::Number(cmp, n) => {
                let p = self.bind(SqlValue::Float(*n));
                format!("({} AND {} {} {})", numeric(column), column, cmp.sql(), p)
            }
            Operand::NumberRange(low, high) => {
                let low = self.bind(SqlValue::Float(*low));
                let high = self.bind(SqlValue::Float(*high));
                format!(
                    "({} AND {c} >= {} AND {c} <= {})",
                    numeric(column),
                    low,
                    high,
                    c = column
                )
            }
            Operand::Day(day) => {
                let p = self.bind_day(*day);
                format!("SUBSTR({}, 1, 10) = {}", column, p)
            }
            Operand::DayRange(low, high) => {
                let low = self.bind_day(*low);
                let high = self.bind_day(*high);
                format!(
                    "({} AND SUBSTR({c}, 1, 10) >= {} AND SUBSTR({c}, 1, 10) <= {})",
                    calendar_day(column),
                    low,
                    high,
                    c = column
                )
            }
        }
    }
}

/// Text storage never compares as a number.
fn numeric(column: &str) -> String {
    format!("typeof({}) IN ('integer', 'real')", column)
}

/// The leading ten characters are a zero-padded, real calendar day.
/// Equality with a bound day already implies this.
fn calendar_day(column: &str) -> String {
    format!("date(SUBSTR({c}, 1, 10)) = SUBSTR({c}, 1, 10)", c = column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{schema_for, Resource};
    use crate::tree::{FilterCond, FilterNode};
    use serde_json::{json, Value};

    fn clients() -> &'static ResourceSchema {
        schema_for(Resource::Clients)
    }

    fn cond(id: &str, field: &str, op: &str, value: Value) -> FilterNode {
        FilterCond::new(id, field, op, value).into()
    }

    #[test]
    fn test_empty_tree_is_tenant_scope_only() {
        let compiled = compile(&FilterGroup::empty(), clients(), "tenant-a", None).unwrap();
        assert_eq!(compiled.where_sql(), "tenant_id = $1");
        assert_eq!(
            compiled.params(),
            &[SqlValue::String("tenant-a".to_string())]
        );
    }

    #[test]
    fn test_scenario_compiles_to_bound_parameters() {
        let tree = FilterGroup::and(
            "root",
            vec![
                cond("c1", "status", "in", json!(["active", "trial"])),
                FilterCond::between("c2", "monthlyValue", json!(1000), json!(3000)).into(),
            ],
        );
        let compiled = compile(&tree, clients(), "t1", None).unwrap();
        assert_eq!(
            compiled.where_sql(),
            "tenant_id = $1 AND (LOWER(status) IN (SELECT value FROM json_each($2)) AND (typeof(monthly_value) IN ('integer', 'real') AND monthly_value >= $3 AND monthly_value <= $4))"
        );
        assert_eq!(
            compiled.params(),
            &[
                SqlValue::String("t1".into()),
                SqlValue::String(r#"["active","trial"]"#.into()),
                SqlValue::Float(1000.0),
                SqlValue::Float(3000.0),
            ]
        );
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let tree = FilterGroup::or(
            "root",
            vec![
                cond("c1", "name", "equals", json!("x' OR '1'='1")),
                cond("c2", "email", "contains", json!("%'; DROP TABLE clients; --")),
            ],
        );
        let compiled = compile(&tree, clients(), "t1'--", None).unwrap();
        assert!(!compiled.where_sql().contains("DROP"));
        assert!(!compiled.where_sql().contains("t1"));
        assert_eq!(
            compiled.where_sql(),
            "tenant_id = $1 AND (LOWER(name) = $2 OR LOWER(email) LIKE $3 ESCAPE '\\')"
        );
        assert_eq!(
            compiled.params()[2],
            SqlValue::String("%\\%'; drop table clients; --%".into())
        );
    }

    #[test]
    fn test_unknown_field_contributes_nothing() {
        let tree = FilterGroup::and(
            "root",
            vec![cond("c1", "tenant_id", "equals", json!("other-tenant"))],
        );
        let compiled = compile(&tree, clients(), "t1", None).unwrap();
        assert_eq!(compiled.where_sql(), "tenant_id = $1");
        assert_eq!(compiled.params().len(), 1);
        assert_eq!(compiled.issues().len(), 1);
    }

    #[test]
    fn test_tenant_scope_survives_or_root() {
        let tree = FilterGroup::or(
            "root",
            vec![
                cond("c1", "plan", "equals", json!("basic")),
                cond("c2", "autoRenew", "equals", json!(true)),
            ],
        );
        let compiled = compile(&tree, clients(), "t1", None).unwrap();
        assert_eq!(
            compiled.where_sql(),
            "tenant_id = $1 AND (LOWER(plan) = $2 OR auto_renew = $3)"
        );
    }

    #[test]
    fn test_never_matching_tree_keeps_tenant_scope() {
        let tree = FilterGroup::and(
            "root",
            vec![cond("c1", "monthlyValue", "between", json!(5))],
        );
        let compiled = compile(&tree, clients(), "t1", None).unwrap();
        assert_eq!(compiled.where_sql(), "tenant_id = $1 AND 1 = 0");
    }

    #[test]
    fn test_date_operators_truncate_to_day() {
        let tree = FilterGroup::and(
            "root",
            vec![
                cond("c1", "createdAt", "equals", json!("2024-03-05T18:00:00Z")),
                FilterCond::between("c2", "createdAt", json!("2024-01-01"), json!("2024-12-31"))
                    .into(),
            ],
        );
        let compiled = compile(&tree, clients(), "t1", None).unwrap();
        assert_eq!(
            compiled.where_sql(),
            "tenant_id = $1 AND (SUBSTR(created_at, 1, 10) = $2 AND (date(SUBSTR(created_at, 1, 10)) = SUBSTR(created_at, 1, 10) AND SUBSTR(created_at, 1, 10) >= $3 AND SUBSTR(created_at, 1, 10) <= $4))"
        );
        assert_eq!(compiled.params()[1], SqlValue::String("2024-03-05".into()));
        assert_eq!(compiled.params()[3], SqlValue::String("2024-12-31".into()));
    }

    #[test]
    fn test_in_list_binds_one_parameter_regardless_of_size() {
        let items: Vec<String> = (0..40_000).map(|i| format!("v{}", i)).collect();
        let tree = FilterGroup::and("root", vec![cond("c1", "status", "in", json!(items.join(",")))]);
        let compiled = compile(&tree, clients(), "t1", None).unwrap();
        assert_eq!(
            compiled.where_sql(),
            "tenant_id = $1 AND LOWER(status) IN (SELECT value FROM json_each($2))"
        );
        assert_eq!(compiled.params().len(), 2);
        let SqlValue::String(list) = &compiled.params()[1] else {
            panic!("expected a JSON array parameter");
        };
        let decoded: Vec<String> = serde_json::from_str(list).unwrap();
        assert_eq!(decoded.len(), 40_000);
        assert_eq!(decoded[0], "v0");
    }

    #[test]
    fn test_number_comparisons_skip_text_storage() {
        let tree = FilterGroup::and(
            "root",
            vec![cond("c1", "monthlyValue", "gt", json!("1000"))],
        );
        let compiled = compile(&tree, clients(), "t1", None).unwrap();
        assert_eq!(
            compiled.where_sql(),
            "tenant_id = $1 AND (typeof(monthly_value) IN ('integer', 'real') AND monthly_value > $2)"
        );
        assert_eq!(compiled.params()[1], SqlValue::Float(1000.0));
    }

    #[test]
    fn test_sort_must_be_a_registry_field() {
        let sort = SortSpec {
            field: "monthlyValue".into(),
            direction: SortDirection::Desc,
        };
        let compiled = compile(&FilterGroup::empty(), clients(), "t1", Some(&sort)).unwrap();
        assert_eq!(compiled.order_by_sql(), Some("ORDER BY monthly_value DESC"));

        let sort = SortSpec {
            field: "monthly_value; DROP TABLE clients".into(),
            direction: SortDirection::Asc,
        };
        let err = compile(&FilterGroup::empty(), clients(), "t1", Some(&sort)).unwrap_err();
        assert_eq!(err.kind(), "invalid_sort_field");
        assert!(err
            .valid_alternatives()
            .unwrap()
            .contains(&"monthlyValue".to_string()));
    }

    #[test]
    fn test_select_appends_limit_and_offset_params() {
        let tree = FilterGroup::and("root", vec![cond("c1", "plan", "equals", json!("basic"))]);
        let sort = SortSpec {
            field: "name".into(),
            direction: SortDirection::Asc,
        };
        let statement = compile(&tree, clients(), "t1", Some(&sort))
            .unwrap()
            .select(25, 50);
        assert!(statement
            .sql
            .starts_with("SELECT id AS \"id\", name AS \"name\", email AS \"email\""));
        assert!(statement.sql.contains("monthly_value AS \"monthlyValue\""));
        assert!(statement.sql.ends_with(
            "FROM clients WHERE tenant_id = $1 AND LOWER(plan) = $2 ORDER BY name ASC LIMIT $3 OFFSET $4"
        ));
        assert_eq!(
            &statement.params[2..],
            &[SqlValue::Integer(25), SqlValue::Integer(50)]
        );
    }

    #[test]
    fn test_sort_spec_parses_from_json() {
        let sort: SortSpec = serde_json::from_value(json!({"field": "name"})).unwrap();
        assert_eq!(sort.direction, SortDirection::Asc);
        let sort: SortSpec =
            serde_json::from_value(json!({"field": "name", "direction": "desc"})).unwrap();
        assert_eq!(sort.direction, SortDirection::Desc);
    }
}
