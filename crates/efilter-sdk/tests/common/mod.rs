//! Common test utilities for SDK integration tests

#![allow(dead_code)]

use efilter_core::{ActingUser, FieldInfo, FieldKind, PropertyType, RelationType, Team, UserId};
use efilter_repository::MemoryReferences;
use efilter_runtime::{EntityRecord, MemoryDirectory, MemorySchema, MemoryStorage};
use efilter_sdk::{FilterEngine, FilterEngineBuilder};
use std::sync::Arc;

/// Engine over a small contact book, with handles on its collaborators
pub struct TestEngine {
    pub engine: FilterEngine,
    pub schema: Arc<MemorySchema>,
    pub directory: Arc<MemoryDirectory>,
    pub references: Arc<MemoryReferences>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_builder(FilterEngineBuilder::new())
    }

    /// Fill in the collaborators of `builder` and build it
    pub fn with_builder(builder: FilterEngineBuilder) -> Self {
        Self::try_with_builder(builder).expect("engine should build")
    }

    pub fn try_with_builder(builder: FilterEngineBuilder) -> efilter_sdk::Result<Self> {
        init_tracing();
        let schema = Arc::new(contact_schema());
        let directory = Arc::new(directory());
        let references = Arc::new(MemoryReferences::new());
        let engine = builder
            .with_schema(schema.clone())
            .with_identity(directory.clone())
            .with_storage(Arc::new(contacts()))
            .with_external_references(references.clone())
            .build()?;
        Ok(Self {
            engine,
            schema,
            directory,
            references,
        })
    }

    /// Acting user as the directory knows them
    pub fn user(&self, id: &str) -> ActingUser {
        self.directory
            .acting_user(&UserId::new(id))
            .expect("user should exist")
    }

    pub fn admin(&self) -> ActingUser {
        self.user("admin").elevated()
    }
}

/// Engine logs show up with `RUST_LOG=debug cargo test -- --nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn contact_schema() -> MemorySchema {
    MemorySchema::new()
        .with_entity_type(
            "Contact",
            [
                FieldInfo::new("last_name", FieldKind::String),
                FieldInfo::new("first_name", FieldKind::String),
                FieldInfo::new("age", FieldKind::Number),
                FieldInfo::new("image", FieldKind::File),
                FieldInfo::reference("owner", "User"),
            ],
        )
        .with_entity_type("Organisation", [FieldInfo::new("name", FieldKind::String)])
        .with_entity_type("User", [])
        .with_relation_type(
            RelationType::new("works_for")
                .with_subjects(["Contact"])
                .with_objects(["Organisation"]),
        )
        .with_property_type(PropertyType::new("vip").with_subjects(["Contact"]))
}

pub fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user("u")
        .with_user("v")
        .with_user("admin")
        .with_team(Team::new("nerv", "NERV").with_member("shinji").with_member("misato"))
}

pub fn contacts() -> MemoryStorage {
    let storage = MemoryStorage::new();
    for record in [
        EntityRecord::new("c1", "Contact")
            .with_field("last_name", "Ikari")
            .with_field("first_name", "Shinji")
            .with_field("age", 14.0)
            .with_field("owner", "shinji")
            .with_relation("works_for", "o1"),
        EntityRecord::new("c2", "Contact")
            .with_field("last_name", "Ikari")
            .with_field("first_name", "Gendo")
            .with_field("age", 48.0)
            .with_field("owner", "nerv"),
        EntityRecord::new("c3", "Contact")
            .with_field("last_name", "Soryu")
            .with_field("first_name", "Asuka")
            .with_field("age", 14.0)
            .with_field("owner", "asuka")
            .with_property("vip"),
        EntityRecord::new("o1", "Organisation").with_field("name", "Nerv"),
    ] {
        storage.insert(record).expect("record should insert");
    }
    storage
}
