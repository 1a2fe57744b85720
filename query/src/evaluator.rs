//! In-memory predicate evaluation over already materialized records.
//!
//! Records are JSON objects keyed by field key. A missing, null or
//! uncoercible record value never satisfies a test, which mirrors SQL's
//! treatment of NULL in a negation-free predicate.

use crate::error::FilterIssue;
use crate::plan::{resolve, Operand, PatternKind, Plan, Test};
use crate::registry::FieldDef;
use crate::tree::FilterGroup;
use crate::value::{fold_text, stored_flag, stored_number, to_day};
use serde_json::Value;

pub struct RecordFilter<'a> {
    plan: Plan<'a>,
    issues: Vec<FilterIssue>,
}

impl<'a> RecordFilter<'a> {
    pub fn new(group: &FilterGroup, fields: &'a [FieldDef]) -> Self {
        let resolved = resolve(group, fields);
        Self {
            plan: resolved.plan,
            issues: resolved.issues,
        }
    }

    pub fn issues(&self) -> &[FilterIssue] {
        &self.issues
    }

    pub fn matches(&self, record: &Value) -> bool {
        eval(&self.plan, record)
    }

    /// Keeps the records that satisfy the filter, preserving order.
    pub fn apply<'r, I>(&self, records: I) -> Vec<&'r Value>
    where
        I: IntoIterator<Item = &'r Value>,
    {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }

    pub fn into_predicate(self) -> impl Fn(&Value) -> bool + 'a {
        move |record: &Value| eval(&self.plan, record)
    }
}

/// Pure `(record) -> bool` for a filter tree.
pub fn predicate<'a>(group: &FilterGroup, fields: &'a [FieldDef]) -> impl Fn(&Value) -> bool + 'a {
    RecordFilter::new(group, fields).into_predicate()
}

fn eval(plan: &Plan<'_>, record: &Value) -> bool {
    match plan {
        Plan::Const(b) => *b,
        Plan::Test(test) => eval_test(test, record),
        Plan::All(parts) => parts.iter().all(|p| eval(p, record)),
        Plan::Any(parts) => parts.iter().any(|p| eval(p, record)),
    }
}

fn eval_test(test: &Test<'_>, record: &Value) -> bool {
    let Some(actual) = record.get(test.field.key) else {
        return false;
    };

    match &test.operand {
        Operand::Text(expected) => fold_text(actual).is_some_and(|a| a == *expected),
        Operand::TextSet(set) => fold_text(actual).is_some_and(|a| set.contains(&a)),
        Operand::Pattern(kind, needle) => fold_text(actual).is_some_and(|a| match kind {
            PatternKind::Contains => a.contains(needle.as_str()),
            PatternKind::Prefix => a.starts_with(needle.as_str()),
            PatternKind::Suffix => a.ends_with(needle.as_str()),
        }),
        Operand::Flag(expected) => stored_flag(actual) == Some(*expected),
        Operand::Number(cmp, expected) => {
            stored_number(actual).is_some_and(|a| cmp.holds(a, *expected))
        }
        Operand::NumberRange(low, high) => {
            stored_number(actual).is_some_and(|a| *low <= a && a <= *high)
        }
        Operand::Day(expected) => to_day(actual) == Some(*expected),
        Operand::DayRange(low, high) => to_day(actual).is_some_and(|d| *low <= d && d <= *high),
    }
}
