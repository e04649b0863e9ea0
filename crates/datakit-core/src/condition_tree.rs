//! Filtering conditions as a tree of `And`/`Or` branches over leaves.

use crate::projection::Projection;
use crate::types::{compare_values, get_field_value, values_equal, Record, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    Present,
    Blank,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IncludesAll,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Present => "present",
            Operator::Blank => "blank",
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::LessThan => "less_than",
            Operator::LessThanOrEqual => "less_than_or_equal",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanOrEqual => "greater_than_or_equal",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IncludesAll => "includes_all",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionTreeLeaf {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionTreeBranch {
    pub aggregator: Aggregator,
    pub conditions: Vec<ConditionTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionTree {
    Branch(ConditionTreeBranch),
    Leaf(ConditionTreeLeaf),
}

impl ConditionTree {
    pub fn leaf(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        ConditionTree::Leaf(ConditionTreeLeaf {
            field: field.into(),
            operator,
            value,
        })
    }

    pub fn and(conditions: Vec<ConditionTree>) -> Self {
        Self::branch(Aggregator::And, conditions)
    }

    pub fn or(conditions: Vec<ConditionTree>) -> Self {
        Self::branch(Aggregator::Or, conditions)
    }

    fn branch(aggregator: Aggregator, mut conditions: Vec<ConditionTree>) -> Self {
        if conditions.len() == 1 {
            return conditions.remove(0);
        }
        ConditionTree::Branch(ConditionTreeBranch {
            aggregator,
            conditions,
        })
    }

    /// Fields referenced by the leaves
    pub fn projection(&self) -> Projection {
        let mut projection = Projection::new();
        self.for_each_leaf(&mut |leaf| projection.push(leaf.field.as_str()));
        projection
    }

    pub fn for_each_leaf<F>(&self, handler: &mut F)
    where
        F: FnMut(&ConditionTreeLeaf),
    {
        match self {
            ConditionTree::Leaf(leaf) => handler(leaf),
            ConditionTree::Branch(branch) => {
                for condition in &branch.conditions {
                    condition.for_each_leaf(handler);
                }
            }
        }
    }

    pub fn some_leaf<F>(&self, predicate: &F) -> bool
    where
        F: Fn(&ConditionTreeLeaf) -> bool,
    {
        match self {
            ConditionTree::Leaf(leaf) => predicate(leaf),
            ConditionTree::Branch(branch) => {
                branch.conditions.iter().any(|c| c.some_leaf(predicate))
            }
        }
    }

    /// Rebuild the tree, replacing every leaf by the handler's output
    pub fn replace_leafs<F>(&self, handler: &mut F) -> ConditionTree
    where
        F: FnMut(&ConditionTreeLeaf) -> ConditionTree,
    {
        match self {
            ConditionTree::Leaf(leaf) => handler(leaf),
            ConditionTree::Branch(branch) => ConditionTree::Branch(ConditionTreeBranch {
                aggregator: branch.aggregator,
                conditions: branch
                    .conditions
                    .iter()
                    .map(|c| c.replace_leafs(handler))
                    .collect(),
            }),
        }
    }

    pub fn replace_fields<F>(&self, mut handler: F) -> ConditionTree
    where
        F: FnMut(&str) -> String,
    {
        self.replace_leafs(&mut |leaf| {
            ConditionTree::Leaf(ConditionTreeLeaf {
                field: handler(&leaf.field),
                operator: leaf.operator,
                value: leaf.value.clone(),
            })
        })
    }

    /// Evaluate the tree against a record held in memory
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            ConditionTree::Leaf(leaf) => leaf.matches(record),
            ConditionTree::Branch(branch) => match branch.aggregator {
                Aggregator::And => branch.conditions.iter().all(|c| c.matches(record)),
                Aggregator::Or => branch.conditions.iter().any(|c| c.matches(record)),
            },
        }
    }
}

impl ConditionTreeLeaf {
    pub fn matches(&self, record: &Record) -> bool {
        let actual = get_field_value(record, &self.field).unwrap_or(&Value::Null);
        let expected = &self.value;

        match self.operator {
            Operator::Present => !is_blank(actual),
            Operator::Blank => is_blank(actual),
            Operator::Equal => values_equal(actual, expected),
            Operator::NotEqual => !values_equal(actual, expected),
            Operator::LessThan => comparable(actual, expected) == Some(Ordering::Less),
            Operator::LessThanOrEqual => matches!(
                comparable(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::GreaterThan => comparable(actual, expected) == Some(Ordering::Greater),
            Operator::GreaterThanOrEqual => matches!(
                comparable(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => as_list(expected).iter().any(|v| values_equal(actual, v)),
            Operator::NotIn => !as_list(expected).iter().any(|v| values_equal(actual, v)),
            Operator::Contains => string_test(actual, expected, |a, e| a.contains(e)),
            Operator::NotContains => !string_test(actual, expected, |a, e| a.contains(e)),
            Operator::StartsWith => string_test(actual, expected, |a, e| a.starts_with(e)),
            Operator::EndsWith => string_test(actual, expected, |a, e| a.ends_with(e)),
            Operator::IncludesAll => match actual {
                Value::Array(items) => as_list(expected)
                    .iter()
                    .all(|e| items.iter().any(|item| values_equal(item, e))),
                _ => false,
            },
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

// Ordering only between values of the same kind
fn comparable(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            Some(compare_values(a, b))
        }
        _ => None,
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn string_test(actual: &Value, expected: &Value, test: fn(&str, &str) -> bool) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(e)) => test(a, e),
        _ => false,
    }
}
