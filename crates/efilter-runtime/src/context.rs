//! Per-request evaluation context
//!
//! The context carries the acting user and the clock of one request. Operand
//! values and compiled sub-filter predicates are memoized inside the context
//! only, so nothing resolved leaks into another request.

use chrono::{DateTime, NaiveDate, Utc};
use efilter_core::{ActingUser, FilterId, Operand, OperandScope, Predicate, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use uuid::Uuid;

/// Evaluation context for one request
#[derive(Debug)]
pub struct EvaluationContext {
    id: Uuid,
    user: Option<ActingUser>,
    now: DateTime<Utc>,
    operands: RefCell<HashMap<&'static str, Vec<Value>>>,
    predicates: RefCell<HashMap<(FilterId, Uuid), Predicate>>,
    resolutions: Cell<usize>,
}

impl EvaluationContext {
    /// Context for `user` at the current time
    pub fn new(user: Option<ActingUser>) -> Self {
        Self::at(user, Utc::now())
    }

    /// Context for `user` with a fixed clock
    pub fn at(user: Option<ActingUser>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            now,
            operands: RefCell::new(HashMap::new()),
            predicates: RefCell::new(HashMap::new()),
            resolutions: Cell::new(0),
        }
    }

    /// Context identity, part of every memo key
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> Option<&ActingUser> {
        self.user.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Resolve an operand, at most once for this context
    pub fn resolve_operand(&self, operand: &Operand) -> Vec<Value> {
        if let Some(values) = self.operands.borrow().get(operand.type_id) {
            return values.clone();
        }
        let scope = OperandScope {
            user: self.user.as_ref(),
            now: self.now,
        };
        let values = operand.resolve(&scope);
        self.resolutions.set(self.resolutions.get() + 1);
        self.operands
            .borrow_mut()
            .insert(operand.type_id, values.clone());
        values
    }

    /// Number of operand resolutions performed so far
    pub fn resolution_count(&self) -> usize {
        self.resolutions.get()
    }

    pub(crate) fn memoized(&self, filter: &FilterId) -> Option<Predicate> {
        self.predicates
            .borrow()
            .get(&(filter.clone(), self.id))
            .cloned()
    }

    pub(crate) fn memoize(&self, filter: &FilterId, predicate: &Predicate) {
        self.predicates
            .borrow_mut()
            .insert((filter.clone(), self.id), predicate.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efilter_core::operand::CURRENT_USER_OPERAND;

    #[test]
    fn test_operand_resolved_once_per_context() {
        let ctx = EvaluationContext::new(Some(ActingUser::new("shinji")));
        let first = ctx.resolve_operand(&CURRENT_USER_OPERAND);
        let second = ctx.resolve_operand(&CURRENT_USER_OPERAND);
        assert_eq!(first, vec![Value::from("shinji")]);
        assert_eq!(first, second);
        assert_eq!(ctx.resolution_count(), 1);
    }

    #[test]
    fn test_contexts_do_not_share_resolutions() {
        let first = EvaluationContext::new(Some(ActingUser::new("shinji")));
        let second = EvaluationContext::new(Some(ActingUser::new("asuka")));
        assert_ne!(first.id(), second.id());
        assert_eq!(
            first.resolve_operand(&CURRENT_USER_OPERAND),
            vec![Value::from("shinji")]
        );
        assert_eq!(
            second.resolve_operand(&CURRENT_USER_OPERAND),
            vec![Value::from("asuka")]
        );
    }

    #[test]
    fn test_predicate_memo() {
        let ctx = EvaluationContext::new(None);
        let id = FilterId::new("f1");
        assert!(ctx.memoized(&id).is_none());
        ctx.memoize(&id, &Predicate::Always);
        assert_eq!(ctx.memoized(&id), Some(Predicate::Always));
    }
}
