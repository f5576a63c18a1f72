//! Predicate tree handed to storage backends
//!
//! A predicate is the fully resolved form of a filter: operands and named
//! date ranges are already substituted. Backends translate it into an actual
//! filtered read (SQL, index scan, in-memory scan...).

use crate::types::Value;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a comparison reads from an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTarget {
    /// Regular field by name
    Field(String),
    /// Custom field by stable identity
    Custom(Uuid),
}

/// Primitive comparisons a backend must support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Equals,
    IEquals,
    Contains,
    IContains,
    Gt,
    Gte,
    Lt,
    Lte,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    IsEmpty,
    /// Inclusive range, values are `[low, high]`
    Range,
}

/// Which related objects a relation test accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedObject {
    /// Any object
    Any,
    /// One specific entity
    Entity(String),
    /// Any entity of a given type
    OfType(String),
    /// Objects of `entity_type` matching a nested predicate
    Matching {
        entity_type: String,
        predicate: Box<Predicate>,
    },
}

/// Resolved filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every entity
    Always,
    /// Matches nothing; backends are never queried for it
    Never,
    /// Field comparison; multiple values are alternatives
    Compare {
        target: FieldTarget,
        comparison: Comparison,
        values: Vec<Value>,
    },
    /// Inclusive date range, either bound optional
    DateRange {
        target: FieldTarget,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// Entity is the subject of a relation of the given type
    Related {
        relation_type: String,
        object: RelatedObject,
    },
    /// Entity carries a property of the given type
    HasProperty(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(target: FieldTarget, comparison: Comparison, values: Vec<Value>) -> Self {
        Predicate::Compare {
            target,
            comparison,
            values,
        }
    }

    /// Conjunction with constant folding
    pub fn and(items: impl IntoIterator<Item = Predicate>) -> Self {
        let mut parts = Vec::new();
        for item in items {
            match item {
                Predicate::Always => {}
                Predicate::Never => return Predicate::Never,
                Predicate::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Predicate::Always,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    /// Disjunction with constant folding
    pub fn or(items: impl IntoIterator<Item = Predicate>) -> Self {
        let mut parts = Vec::new();
        for item in items {
            match item {
                Predicate::Never => {}
                Predicate::Always => return Predicate::Always,
                Predicate::Or(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Predicate::Never,
            1 => parts.remove(0),
            _ => Predicate::Or(parts),
        }
    }

    /// Negation with constant folding
    pub fn negate(self) -> Self {
        match self {
            Predicate::Always => Predicate::Never,
            Predicate::Never => Predicate::Always,
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Keep `self` when `keep` holds, negate otherwise
    pub fn when(self, keep: bool) -> Self {
        if keep {
            self
        } else {
            self.negate()
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Predicate::Never)
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::Always)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_is(value: &str) -> Predicate {
        Predicate::compare(
            FieldTarget::Field("name".to_string()),
            Comparison::Equals,
            vec![Value::from(value)],
        )
    }

    #[test]
    fn test_and_folding() {
        assert_eq!(Predicate::and(vec![]), Predicate::Always);
        assert_eq!(
            Predicate::and(vec![name_is("a"), Predicate::Never]),
            Predicate::Never
        );
        assert_eq!(
            Predicate::and(vec![Predicate::Always, name_is("a")]),
            name_is("a")
        );
    }

    #[test]
    fn test_or_folding() {
        assert_eq!(Predicate::or(vec![]), Predicate::Never);
        assert_eq!(
            Predicate::or(vec![name_is("a"), Predicate::Always]),
            Predicate::Always
        );
        assert_eq!(
            Predicate::or(vec![Predicate::Never, name_is("b")]),
            name_is("b")
        );
    }

    #[test]
    fn test_nested_groups_are_flattened() {
        let inner = Predicate::And(vec![name_is("a"), name_is("b")]);
        match Predicate::and(vec![inner, name_is("c")]) {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_negation() {
        assert_eq!(Predicate::Always.negate(), Predicate::Never);
        assert_eq!(name_is("a").negate().negate(), name_is("a"));
        assert_eq!(name_is("a").when(true), name_is("a"));
    }
}
