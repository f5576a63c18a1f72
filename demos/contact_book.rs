//! Contact book example
//!
//! This example demonstrates:
//! - Building a FilterEngine over an in-memory contact book
//! - Creating public and private filters, one using the other
//! - A rejected edit (sub-filter cycle) and a rejected delete (dependents)
//!
//! Run with `RUST_LOG=debug` to see the engine's tracing output.

use efilter_core::{FieldInfo, FieldKind, Team, UserId};
use efilter_runtime::{EntityRecord, MemoryDirectory, MemorySchema, MemoryStorage};
use efilter_sdk::{ConditionDescriptor, FilterEngineBuilder, FilterRequest, OperatorId, Ownership};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Contact Book Example ===\n");

    let schema = MemorySchema::new().with_entity_type(
        "Contact",
        [
            FieldInfo::new("last_name", FieldKind::String),
            FieldInfo::new("age", FieldKind::Number),
        ],
    );
    let storage = MemoryStorage::new();
    storage.insert(
        EntityRecord::new("c1", "Contact")
            .with_field("last_name", "Ikari")
            .with_field("age", 14.0),
    )?;
    storage.insert(
        EntityRecord::new("c2", "Contact")
            .with_field("last_name", "Ikari")
            .with_field("age", 48.0),
    )?;
    storage.insert(
        EntityRecord::new("c3", "Contact")
            .with_field("last_name", "Soryu")
            .with_field("age", 14.0),
    )?;
    let directory = MemoryDirectory::new().with_team(Team::new("nerv", "NERV").with_member("misato"));

    let engine = FilterEngineBuilder::new()
        .with_schema(Arc::new(schema))
        .with_identity(Arc::new(directory))
        .with_storage(Arc::new(storage))
        .build()?;
    println!("Filter engine initialized successfully\n");

    let misato = efilter_sdk::ActingUser::new("misato").with_team("nerv");

    let ikari = engine.create(
        &misato,
        FilterRequest::new("Ikari family", "Contact").with_condition(
            ConditionDescriptor::regular_field("last_name", OperatorId::EQUALS, ["Ikari"]),
        ),
    )?;
    let pilots = engine.create(
        &misato,
        FilterRequest::new("Young Ikari", "Contact")
            .with_ownership(Ownership::PrivateToUser(UserId::new("misato")))
            .with_condition(ConditionDescriptor::sub_filter(ikari.id.as_str()))
            .with_condition(ConditionDescriptor::regular_field("age", OperatorId::LT, [18.0])),
    )?;

    println!("{} ({}): {:?}", ikari.name, ikari.id, engine.apply(&misato, &ikari.id)?);
    println!("{} ({}): {:?}\n", pilots.name, pilots.id, engine.apply(&misato, &pilots.id)?);

    let cycle = engine.set_conditions(
        &misato,
        &ikari.id,
        vec![ConditionDescriptor::sub_filter(pilots.id.as_str())],
        false,
    );
    if let Err(e) = cycle {
        println!("Edit rejected: {}", e);
    }

    if let Err(e) = engine.delete(&misato, &ikari.id) {
        println!("Delete rejected: {}", e);
    }

    Ok(())
}
