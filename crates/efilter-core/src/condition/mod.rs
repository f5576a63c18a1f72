//! Condition Module
//!
//! A condition is one atomic test contributed to an entity filter. Its
//! handler kind decides how the reference and the structured value are
//! interpreted:
//!
//! | kind | reference | value |
//! |---|---|---|
//! | `SubFilter` (1) | sub-filter id | `{}` |
//! | `RegularField` (5) | field name | `{"operator": 5, "values": ["Ikari"]}` |
//! | `DateRegularField` (6) | field name | `{"named": "current_year"}` or `{"custom": {"start": .., "end": ..}}` |
//! | `Relation` (10) | relation type id | `{"has": true}` (+ optional `entity_id` / `entity_type`) |
//! | `RelationSubFilter` (11) | relation type id | `{"has": true, "filter_id": ".."}` |
//! | `Property` (15) | property type id | `{"has": false}` |
//! | `CustomField` (20) | custom field uuid | `{"operator": 9, "values": [3]}` |
//! | `DateCustomField` (21) | custom field uuid | same as `DateRegularField` |
//!
//! Build requests arrive as [`ConditionDescriptor`]s and are turned into
//! [`Condition`]s by the handlers of the runtime crate.

mod date_range;
mod types;

pub use date_range::{DateRange, NamedRange, ResolvedRange};
pub use types::{Condition, ConditionDescriptor, ConditionValue, HandlerKind, StoredCondition};
