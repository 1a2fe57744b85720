//! Filter tree wire model.
//!
//! Trees are plain values: children are owned, so a tree can never contain a
//! cycle, and an edit produces a new tree rather than mutating a shared one.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_TREE_DEPTH: usize = 16;
pub const MAX_TREE_NODES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logical {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FilterNode {
    #[serde(rename = "cond")]
    Cond(FilterCond),
    #[serde(rename = "group")]
    Group(FilterGroup),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCond {
    pub id: String,
    pub field: String,
    /// Kept as text so an unknown operator degrades to a dropped node instead
    /// of failing deserialization of the whole tree.
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub id: String,
    pub logical: Logical,
    #[serde(default)]
    pub children: Vec<FilterNode>,
}

impl FilterCond {
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            operator: operator.into(),
            value: Some(value),
            value2: None,
        }
    }

    pub fn between(
        id: impl Into<String>,
        field: impl Into<String>,
        low: Value,
        high: Value,
    ) -> Self {
        Self {
            value2: Some(high),
            ..Self::new(id, field, "between", low)
        }
    }
}

impl From<FilterCond> for FilterNode {
    fn from(cond: FilterCond) -> Self {
        FilterNode::Cond(cond)
    }
}

impl From<FilterGroup> for FilterNode {
    fn from(group: FilterGroup) -> Self {
        FilterNode::Group(group)
    }
}

impl FilterGroup {
    pub fn new(id: impl Into<String>, logical: Logical, children: Vec<FilterNode>) -> Self {
        Self {
            id: id.into(),
            logical,
            children,
        }
    }

    pub fn and(id: impl Into<String>, children: Vec<FilterNode>) -> Self {
        Self::new(id, Logical::And, children)
    }

    pub fn or(id: impl Into<String>, children: Vec<FilterNode>) -> Self {
        Self::new(id, Logical::Or, children)
    }

    /// A root that matches everything.
    pub fn empty() -> Self {
        Self::and("root", Vec::new())
    }

    /// Same children, different combinator.
    pub fn with_logical(&self, logical: Logical) -> Self {
        Self {
            logical,
            ..self.clone()
        }
    }

    /// Copy of this group with one more child appended.
    pub fn with_child(&self, child: impl Into<FilterNode>) -> Self {
        let mut next = self.clone();
        next.children.push(child.into());
        next
    }

    /// Parses a request body. The root must be a group.
    pub fn from_json(value: Value) -> Result<Self, QueryError> {
        let node: FilterNode =
            serde_json::from_value(value).map_err(|e| QueryError::MalformedFilter {
                message: e.to_string(),
            })?;
        let group = match node {
            FilterNode::Group(group) => group,
            FilterNode::Cond(_) => {
                return Err(QueryError::MalformedFilter {
                    message: "filter root must be a group".to_string(),
                })
            }
        };
        group.check_complexity()?;
        Ok(group)
    }

    /// Nesting depth, counting this group as 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| match child {
                FilterNode::Group(g) => g.depth(),
                FilterNode::Cond(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }

    /// Total number of nodes, this group included.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| match child {
                FilterNode::Group(g) => g.node_count(),
                FilterNode::Cond(_) => 1,
            })
            .sum::<usize>()
    }

    pub fn check_complexity(&self) -> Result<(), QueryError> {
        let depth = self.depth();
        let nodes = self.node_count();
        if depth > MAX_TREE_DEPTH || nodes > MAX_TREE_NODES {
            return Err(QueryError::FilterTooComplex { depth, nodes });
        }
        Ok(())
    }
}
