//! Predicate conditions and their evaluation against documents.
//!
//! Every backend filters through [`matches`] so that the store and the
//! change classifier agree on what "matching" means.

use std::cmp::Ordering;
use std::str::FromStr;

use common::DocumentRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::PredicateError;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Scalar equality; references compare by identity.
    #[serde(rename = "==")]
    Equals,
    /// Negation of [`Operator::Equals`].
    #[serde(rename = "!=")]
    NotEquals,
    /// Natural ordering on numbers and strings (ISO dates included).
    #[serde(rename = ">")]
    GreaterThan,
    /// Membership test on an array-valued field.
    #[serde(rename = "array-contains")]
    ArrayContains,
}

impl Operator {
    /// Returns the configuration token for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::ArrayContains => "array-contains",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Operator::Equals),
            "!=" => Ok(Operator::NotEquals),
            ">" => Ok(Operator::GreaterThan),
            "array-contains" => Ok(Operator::ArrayContains),
            other => Err(PredicateError::UnknownOperator(other.to_string())),
        }
    }
}

/// A single `(field, operator, value)` condition on a top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Predicate {
    /// Creates a predicate.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field == value`
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    /// `field != value`
    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::NotEquals, value)
    }

    /// `field > value`
    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::GreaterThan, value)
    }

    /// `value ∈ field`
    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::ArrayContains, value)
    }

    /// Evaluates this predicate against a present document.
    pub fn test(&self, doc: &Document) -> bool {
        let actual = doc.get(&self.field);
        match self.op {
            Operator::Equals => actual.is_some_and(|a| values_equal(a, &self.value)),
            Operator::NotEquals => !actual.is_some_and(|a| values_equal(a, &self.value)),
            Operator::GreaterThan => actual.is_some_and(|a| value_greater_than(a, &self.value)),
            Operator::ArrayContains => actual
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|item| values_equal(item, &self.value))),
        }
    }
}

/// Returns true when `doc` exists and satisfies every predicate.
///
/// Evaluation stops at the first failing predicate. An empty predicate
/// list matches any present document.
pub fn matches(doc: Option<&Document>, predicates: &[Predicate]) -> bool {
    match doc {
        Some(doc) => predicates.iter().all(|p| p.test(doc)),
        None => false,
    }
}

/// Equality with reference identity and numeric normalization.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (DocumentRef::from_value(a), DocumentRef::from_value(b)) {
        (Some(ra), Some(rb)) => return ra == rb,
        (Some(_), None) | (None, Some(_)) => return false,
        (None, None) => {}
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn value_greater_than(actual: &Value, bound: &Value) -> bool {
    match (actual, bound) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x > y,
            _ => false,
        },
        (Value::String(x), Value::String(y)) => x > y,
        _ => false,
    }
}

fn type_rank(value: &Value) -> u8 {
    if DocumentRef::from_value(value).is_some() {
        return 4;
    }
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Total ordering over JSON values used for `order` clauses.
///
/// Values of different kinds order as
/// null < bool < number < string < reference < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    if ra == 4 {
        return DocumentRef::from_value(a).cmp(&DocumentRef::from_value(b));
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_values(lv, rv)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => Ordering::Equal,
    }
}
