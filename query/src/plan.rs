//! Resolution of a filter tree against a field registry.
//!
//! Both backends evaluate the same [`Plan`]: field lookup, operator legality,
//! value coercion and constant folding happen here once, so the relational
//! compiler and the in-memory evaluator cannot drift apart.

use crate::error::FilterIssue;
use crate::registry::{FieldDef, FieldType, Operator};
use crate::tree::{FilterCond, FilterGroup, FilterNode, Logical};
use crate::value::{fold_text, fold_text_list, to_day, to_flag, to_number};
use chrono::NaiveDate;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Comparison {
    pub fn sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Gte => ">=",
            Comparison::Lte => "<=",
        }
    }

    pub fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Eq => left == right,
            Comparison::Gt => left > right,
            Comparison::Lt => left < right,
            Comparison::Gte => left >= right,
            Comparison::Lte => left <= right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Contains,
    Prefix,
    Suffix,
}

/// A normalized right-hand side. Text operands are already case folded.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    TextSet(Vec<String>),
    Pattern(PatternKind, String),
    Flag(bool),
    Number(Comparison, f64),
    NumberRange(f64, f64),
    Day(NaiveDate),
    DayRange(NaiveDate, NaiveDate),
}

/// Why a legal condition can match no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unmatchable {
    MissingValue,
    Uncoercible,
    MissingBound,
    InvertedRange,
    EmptySet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Test<'a> {
    pub field: &'a FieldDef,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan<'a> {
    Const(bool),
    Test(Test<'a>),
    All(Vec<Plan<'a>>),
    Any(Vec<Plan<'a>>),
}

type Build = fn(&FilterCond) -> Result<Operand, Unmatchable>;

struct Rule {
    field_type: FieldType,
    operator: Operator,
    build: Build,
}

const fn rule(field_type: FieldType, operator: Operator, build: Build) -> Rule {
    Rule {
        field_type,
        operator,
        build,
    }
}

/// One entry per legal `(type, operator)` pair. Adding a type means adding rows.
static RULES: &[Rule] = &[
    rule(FieldType::String, Operator::Equals, text_equals),
    rule(FieldType::String, Operator::Contains, text_contains),
    rule(FieldType::String, Operator::StartsWith, text_starts_with),
    rule(FieldType::String, Operator::EndsWith, text_ends_with),
    rule(FieldType::String, Operator::In, text_in),
    rule(FieldType::Id, Operator::Equals, text_equals),
    rule(FieldType::Id, Operator::Contains, text_contains),
    rule(FieldType::Id, Operator::StartsWith, text_starts_with),
    rule(FieldType::Id, Operator::EndsWith, text_ends_with),
    rule(FieldType::Id, Operator::In, text_in),
    rule(FieldType::Enum, Operator::Equals, text_equals),
    rule(FieldType::Enum, Operator::In, text_in),
    rule(FieldType::Boolean, Operator::Equals, flag_equals),
    rule(FieldType::Number, Operator::Equals, number_equals),
    rule(FieldType::Number, Operator::Gt, number_gt),
    rule(FieldType::Number, Operator::Lt, number_lt),
    rule(FieldType::Number, Operator::Gte, number_gte),
    rule(FieldType::Number, Operator::Lte, number_lte),
    rule(FieldType::Number, Operator::Between, number_between),
    rule(FieldType::Date, Operator::Equals, day_equals),
    rule(FieldType::Date, Operator::Between, day_between),
];

fn rule_for(field_type: FieldType, operator: Operator) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|r| r.field_type == field_type && r.operator == operator)
}

fn value(cond: &FilterCond) -> Result<&Value, Unmatchable> {
    cond.value.as_ref().ok_or(Unmatchable::MissingValue)
}

fn text_equals(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    let text = fold_text(value(cond)?).ok_or(Unmatchable::Uncoercible)?;
    Ok(Operand::Text(text))
}

fn pattern(cond: &FilterCond, kind: PatternKind) -> Result<Operand, Unmatchable> {
    let needle = fold_text(value(cond)?).ok_or(Unmatchable::Uncoercible)?;
    Ok(Operand::Pattern(kind, needle))
}

fn text_contains(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    pattern(cond, PatternKind::Contains)
}

fn text_starts_with(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    pattern(cond, PatternKind::Prefix)
}

fn text_ends_with(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    pattern(cond, PatternKind::Suffix)
}

fn text_in(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    let items = fold_text_list(value(cond)?);
    if items.is_empty() {
        return Err(Unmatchable::EmptySet);
    }
    Ok(Operand::TextSet(items))
}

fn flag_equals(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    let flag = to_flag(value(cond)?).ok_or(Unmatchable::Uncoercible)?;
    Ok(Operand::Flag(flag))
}

fn number(cond: &FilterCond, comparison: Comparison) -> Result<Operand, Unmatchable> {
    let n = to_number(value(cond)?).ok_or(Unmatchable::Uncoercible)?;
    Ok(Operand::Number(comparison, n))
}

fn number_equals(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    number(cond, Comparison::Eq)
}

fn number_gt(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    number(cond, Comparison::Gt)
}

fn number_lt(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    number(cond, Comparison::Lt)
}

fn number_gte(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    number(cond, Comparison::Gte)
}

fn number_lte(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    number(cond, Comparison::Lte)
}

/// Both bounds of a `between`, or `MissingBound` if either is absent.
fn bounds(cond: &FilterCond) -> Result<(&Value, &Value), Unmatchable> {
    match (&cond.value, &cond.value2) {
        (Some(low), Some(high)) => Ok((low, high)),
        _ => Err(Unmatchable::MissingBound),
    }
}

fn number_between(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    let (low, high) = bounds(cond)?;
    let low = to_number(low).ok_or(Unmatchable::Uncoercible)?;
    let high = to_number(high).ok_or(Unmatchable::Uncoercible)?;
    if low > high {
        return Err(Unmatchable::InvertedRange);
    }
    Ok(Operand::NumberRange(low, high))
}

fn day_equals(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    let day = to_day(value(cond)?).ok_or(Unmatchable::Uncoercible)?;
    Ok(Operand::Day(day))
}

/// Upper bound is inclusive through the end of its day.
fn day_between(cond: &FilterCond) -> Result<Operand, Unmatchable> {
    let (low, high) = bounds(cond)?;
    let low = to_day(low).ok_or(Unmatchable::Uncoercible)?;
    let high = to_day(high).ok_or(Unmatchable::Uncoercible)?;
    if low > high {
        return Err(Unmatchable::InvertedRange);
    }
    Ok(Operand::DayRange(low, high))
}

/// A resolved tree plus the problems that were tolerated on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub plan: Plan<'a>,
    pub issues: Vec<FilterIssue>,
}

pub fn resolve<'a>(group: &FilterGroup, fields: &'a [FieldDef]) -> Resolved<'a> {
    let mut issues = Vec::new();
    let plan = resolve_group(group, fields, &mut issues);
    for issue in &issues {
        tracing::debug!(
            node_id = %issue.node_id(),
            field = %issue.field(),
            operator = issue.operator(),
            "tolerated filter problem: {}",
            issue
        );
    }
    Resolved { plan, issues }
}

fn resolve_group<'a>(
    group: &FilterGroup,
    fields: &'a [FieldDef],
    issues: &mut Vec<FilterIssue>,
) -> Plan<'a> {
    let mut parts: Vec<Plan<'a>> = group
        .children
        .iter()
        .filter_map(|child| match child {
            FilterNode::Cond(cond) => resolve_cond(cond, fields, issues),
            FilterNode::Group(inner) => Some(resolve_group(inner, fields, issues)),
        })
        .collect();

    // Vacuously true, whether it started empty or every child was dropped.
    if parts.is_empty() {
        return Plan::Const(true);
    }

    let (absorbing, identity) = match group.logical {
        Logical::And => (false, true),
        Logical::Or => (true, false),
    };
    if parts.contains(&Plan::Const(absorbing)) {
        return Plan::Const(absorbing);
    }
    parts.retain(|p| *p != Plan::Const(identity));

    match parts.len() {
        0 => Plan::Const(identity),
        1 => parts.remove(0),
        _ => match group.logical {
            Logical::And => Plan::All(parts),
            Logical::Or => Plan::Any(parts),
        },
    }
}

/// `None` means the node is dropped from its parent.
fn resolve_cond<'a>(
    cond: &FilterCond,
    fields: &'a [FieldDef],
    issues: &mut Vec<FilterIssue>,
) -> Option<Plan<'a>> {
    let Some(field) = fields.iter().find(|f| f.key == cond.field) else {
        issues.push(FilterIssue::UnknownField {
            node_id: cond.id.clone(),
            field: cond.field.clone(),
        });
        return None;
    };

    let rule = Operator::from_str(&cond.operator)
        .ok()
        .filter(|op| field.allows(*op))
        .and_then(|op| rule_for(field.field_type, op));
    let Some(rule) = rule else {
        issues.push(FilterIssue::IllegalOperator {
            node_id: cond.id.clone(),
            field: cond.field.clone(),
            operator: cond.operator.clone(),
        });
        return None;
    };

    match (rule.build)(cond) {
        Ok(operand) => Some(Plan::Test(Test { field, operand })),
        Err(reason) => {
            if reason == Unmatchable::MissingBound {
                issues.push(FilterIssue::MalformedBetween {
                    node_id: cond.id.clone(),
                    field: cond.field.clone(),
                });
            }
            Some(Plan::Const(false))
        }
    }
}
