//! Operator catalog
//!
//! Operators are immutable records shared by every condition that uses them.
//! Each one declares which field kinds it accepts, how many values it takes,
//! and a pure builder turning a target plus values into a predicate.

use crate::predicate::{Comparison, FieldTarget, Predicate};
use crate::types::{FieldKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable operator identifier (persisted inside conditions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub u16);

impl OperatorId {
    pub const EQUALS: OperatorId = OperatorId(1);
    pub const IEQUALS: OperatorId = OperatorId(2);
    pub const EQUALS_NOT: OperatorId = OperatorId(3);
    pub const IEQUALS_NOT: OperatorId = OperatorId(4);
    pub const CONTAINS: OperatorId = OperatorId(5);
    pub const ICONTAINS: OperatorId = OperatorId(6);
    pub const CONTAINS_NOT: OperatorId = OperatorId(7);
    pub const ICONTAINS_NOT: OperatorId = OperatorId(8);
    pub const GT: OperatorId = OperatorId(9);
    pub const GTE: OperatorId = OperatorId(10);
    pub const LT: OperatorId = OperatorId(11);
    pub const LTE: OperatorId = OperatorId(12);
    pub const STARTSWITH: OperatorId = OperatorId(13);
    pub const ISTARTSWITH: OperatorId = OperatorId(14);
    pub const STARTSWITH_NOT: OperatorId = OperatorId(15);
    pub const ISTARTSWITH_NOT: OperatorId = OperatorId(16);
    pub const ENDSWITH: OperatorId = OperatorId(17);
    pub const IENDSWITH: OperatorId = OperatorId(18);
    pub const ENDSWITH_NOT: OperatorId = OperatorId(19);
    pub const IENDSWITH_NOT: OperatorId = OperatorId(20);
    pub const ISEMPTY: OperatorId = OperatorId(21);
    pub const RANGE: OperatorId = OperatorId(22);
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of values an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// One or more alternatives
    AtLeastOne,
    /// Exactly `n` values
    Exactly(usize),
    /// Exactly one boolean flag
    Flag,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::AtLeastOne => count >= 1,
            Arity::Exactly(n) => count == *n,
            Arity::Flag => count == 1,
        }
    }
}

/// Pure predicate builder
pub type BuildFn = fn(FieldTarget, Vec<Value>) -> Predicate;

/// Comparison operator record
#[derive(Clone)]
pub struct Operator {
    pub id: OperatorId,
    pub name: &'static str,
    pub accepted_kinds: &'static [FieldKind],
    pub arity: Arity,
    builder: BuildFn,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("accepted_kinds", &self.accepted_kinds)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Operator {
    pub const fn new(
        id: OperatorId,
        name: &'static str,
        accepted_kinds: &'static [FieldKind],
        arity: Arity,
        builder: BuildFn,
    ) -> Self {
        Self {
            id,
            name,
            accepted_kinds,
            arity,
            builder,
        }
    }

    /// Returns true if the operator can be applied to fields of `kind`
    pub fn accepts(&self, kind: FieldKind) -> bool {
        self.accepted_kinds.contains(&kind)
    }

    /// Build the predicate for already validated values
    pub fn build(&self, target: FieldTarget, values: Vec<Value>) -> Predicate {
        (self.builder)(target, values)
    }
}

const STRING_KINDS: &[FieldKind] = &[FieldKind::String];
const ORDERED_KINDS: &[FieldKind] = &[FieldKind::Number, FieldKind::Date];
const EQUATABLE_KINDS: &[FieldKind] = &[
    FieldKind::String,
    FieldKind::Number,
    FieldKind::Date,
    FieldKind::Reference,
    FieldKind::Boolean,
];

macro_rules! comparison_builder {
    ($name:ident, $comparison:expr, $keep:expr) => {
        fn $name(target: FieldTarget, values: Vec<Value>) -> Predicate {
            Predicate::compare(target, $comparison, values).when($keep)
        }
    };
}

comparison_builder!(build_equals, Comparison::Equals, true);
comparison_builder!(build_iequals, Comparison::IEquals, true);
comparison_builder!(build_equals_not, Comparison::Equals, false);
comparison_builder!(build_iequals_not, Comparison::IEquals, false);
comparison_builder!(build_contains, Comparison::Contains, true);
comparison_builder!(build_icontains, Comparison::IContains, true);
comparison_builder!(build_contains_not, Comparison::Contains, false);
comparison_builder!(build_icontains_not, Comparison::IContains, false);
comparison_builder!(build_gt, Comparison::Gt, true);
comparison_builder!(build_gte, Comparison::Gte, true);
comparison_builder!(build_lt, Comparison::Lt, true);
comparison_builder!(build_lte, Comparison::Lte, true);
comparison_builder!(build_startswith, Comparison::StartsWith, true);
comparison_builder!(build_istartswith, Comparison::IStartsWith, true);
comparison_builder!(build_startswith_not, Comparison::StartsWith, false);
comparison_builder!(build_istartswith_not, Comparison::IStartsWith, false);
comparison_builder!(build_endswith, Comparison::EndsWith, true);
comparison_builder!(build_iendswith, Comparison::IEndsWith, true);
comparison_builder!(build_endswith_not, Comparison::EndsWith, false);
comparison_builder!(build_iendswith_not, Comparison::IEndsWith, false);
comparison_builder!(build_range, Comparison::Range, true);

fn build_is_empty(target: FieldTarget, values: Vec<Value>) -> Predicate {
    let empty = values.first().and_then(Value::as_bool).unwrap_or(true);
    Predicate::compare(target, Comparison::IsEmpty, Vec::new()).when(empty)
}

const STANDARD_OPERATORS: &[Operator] = &[
    Operator::new(OperatorId::EQUALS, "equals", EQUATABLE_KINDS, Arity::AtLeastOne, build_equals),
    Operator::new(OperatorId::IEQUALS, "iequals", STRING_KINDS, Arity::AtLeastOne, build_iequals),
    Operator::new(OperatorId::EQUALS_NOT, "equals_not", EQUATABLE_KINDS, Arity::AtLeastOne, build_equals_not),
    Operator::new(OperatorId::IEQUALS_NOT, "iequals_not", STRING_KINDS, Arity::AtLeastOne, build_iequals_not),
    Operator::new(OperatorId::CONTAINS, "contains", STRING_KINDS, Arity::AtLeastOne, build_contains),
    Operator::new(OperatorId::ICONTAINS, "icontains", STRING_KINDS, Arity::AtLeastOne, build_icontains),
    Operator::new(OperatorId::CONTAINS_NOT, "contains_not", STRING_KINDS, Arity::AtLeastOne, build_contains_not),
    Operator::new(OperatorId::ICONTAINS_NOT, "icontains_not", STRING_KINDS, Arity::AtLeastOne, build_icontains_not),
    Operator::new(OperatorId::GT, "gt", ORDERED_KINDS, Arity::Exactly(1), build_gt),
    Operator::new(OperatorId::GTE, "gte", ORDERED_KINDS, Arity::Exactly(1), build_gte),
    Operator::new(OperatorId::LT, "lt", ORDERED_KINDS, Arity::Exactly(1), build_lt),
    Operator::new(OperatorId::LTE, "lte", ORDERED_KINDS, Arity::Exactly(1), build_lte),
    Operator::new(OperatorId::STARTSWITH, "startswith", STRING_KINDS, Arity::AtLeastOne, build_startswith),
    Operator::new(OperatorId::ISTARTSWITH, "istartswith", STRING_KINDS, Arity::AtLeastOne, build_istartswith),
    Operator::new(OperatorId::STARTSWITH_NOT, "startswith_not", STRING_KINDS, Arity::AtLeastOne, build_startswith_not),
    Operator::new(OperatorId::ISTARTSWITH_NOT, "istartswith_not", STRING_KINDS, Arity::AtLeastOne, build_istartswith_not),
    Operator::new(OperatorId::ENDSWITH, "endswith", STRING_KINDS, Arity::AtLeastOne, build_endswith),
    Operator::new(OperatorId::IENDSWITH, "iendswith", STRING_KINDS, Arity::AtLeastOne, build_iendswith),
    Operator::new(OperatorId::ENDSWITH_NOT, "endswith_not", STRING_KINDS, Arity::AtLeastOne, build_endswith_not),
    Operator::new(OperatorId::IENDSWITH_NOT, "iendswith_not", STRING_KINDS, Arity::AtLeastOne, build_iendswith_not),
    Operator::new(
        OperatorId::ISEMPTY,
        "isempty",
        &[
            FieldKind::String,
            FieldKind::Number,
            FieldKind::Date,
            FieldKind::Reference,
            FieldKind::Boolean,
        ],
        Arity::Flag,
        build_is_empty,
    ),
    Operator::new(OperatorId::RANGE, "range", ORDERED_KINDS, Arity::Exactly(2), build_range),
];

/// Immutable set of operators, built once and shared
#[derive(Debug, Clone)]
pub struct OperatorCatalog {
    operators: BTreeMap<OperatorId, Operator>,
}

impl OperatorCatalog {
    /// Catalog with the standard operators
    pub fn standard() -> Self {
        Self {
            operators: STANDARD_OPERATORS
                .iter()
                .map(|op| (op.id, op.clone()))
                .collect(),
        }
    }

    /// Add or replace an operator
    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operators.insert(operator.id, operator);
        self
    }

    pub fn get(&self, id: OperatorId) -> Option<&Operator> {
        self.operators.get(&id)
    }

    /// Operators usable on fields of `kind`
    pub fn for_kind(&self, kind: FieldKind) -> impl Iterator<Item = &Operator> {
        self.operators.values().filter(move |op| op.accepts(kind))
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl Default for OperatorCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> FieldTarget {
        FieldTarget::Field("last_name".to_string())
    }

    #[test]
    fn test_standard_catalog_is_complete() {
        let catalog = OperatorCatalog::standard();
        assert_eq!(catalog.len(), 22);
        for id in 1..=22 {
            assert!(catalog.get(OperatorId(id)).is_some(), "missing operator {}", id);
        }
    }

    #[test]
    fn test_gt_rejects_strings() {
        let catalog = OperatorCatalog::standard();
        let gt = catalog.get(OperatorId::GT).unwrap();
        assert!(!gt.accepts(FieldKind::String));
        assert!(gt.accepts(FieldKind::Number));
        assert!(gt.accepts(FieldKind::Date));
    }

    #[test]
    fn test_negated_operator_builds_not() {
        let catalog = OperatorCatalog::standard();
        let op = catalog.get(OperatorId::CONTAINS_NOT).unwrap();
        let pred = op.build(target(), vec![Value::from("Ikari")]);
        match pred {
            Predicate::Not(inner) => assert_eq!(
                *inner,
                Predicate::compare(target(), Comparison::Contains, vec![Value::from("Ikari")])
            ),
            other => panic!("Expected Not, got {:?}", other),
        }
    }

    #[test]
    fn test_is_empty_flag() {
        let catalog = OperatorCatalog::standard();
        let op = catalog.get(OperatorId::ISEMPTY).unwrap();
        assert_eq!(op.arity, Arity::Flag);

        let empty = op.build(target(), vec![Value::Bool(true)]);
        assert_eq!(
            empty,
            Predicate::compare(target(), Comparison::IsEmpty, vec![])
        );
        let filled = op.build(target(), vec![Value::Bool(false)]);
        assert!(matches!(filled, Predicate::Not(_)));
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exactly(2).accepts(2));
        assert!(!Arity::Exactly(2).accepts(1));
        assert!(Arity::AtLeastOne.accepts(3));
        assert!(!Arity::AtLeastOne.accepts(0));
    }

    #[test]
    fn test_operators_for_kind() {
        let catalog = OperatorCatalog::standard();
        let boolean_ops: Vec<_> = catalog.for_kind(FieldKind::Boolean).map(|op| op.id).collect();
        assert_eq!(
            boolean_ops,
            vec![OperatorId::EQUALS, OperatorId::EQUALS_NOT, OperatorId::ISEMPTY]
        );
        assert_eq!(catalog.for_kind(FieldKind::File).count(), 0);
    }
}
