//! Unit tests for engine configuration and system filter installation

mod common;

use common::TestEngine;
use efilter_core::{Condition, ConditionValue};
use efilter_repository::{FileFilterRepository, FilterRepository, MemoryFilterRepository};
use efilter_sdk::{
    ConditionDescriptor, EngineConfig, EntityFilter, FilterEngineBuilder, FilterId, FilterRequest,
    FilterType, FilterTypeConfig, HandlerKind, OperatorId, SdkError, Value,
};
use std::sync::Arc;
use tempfile::TempDir;

const SYSTEM_FILTERS: &str = r#"
filters:
  - id: contacts_ikari
    name: Ikari family
    entity_type: Contact
    conditions:
      - { kind: 5, ref: last_name, value: { operator: 1, values: ["Ikari"] } }
  - id: contacts_vip
    name: VIP contacts
    entity_type: Contact
    conditions:
      - { kind: 15, ref: vip, value: { has: true } }
"#;

fn write_system_filters(dir: &TempDir) -> EngineConfig {
    std::fs::write(dir.path().join("contacts.yaml"), SYSTEM_FILTERS).unwrap();
    let config_path = dir.path().join("engine.yaml");
    std::fs::write(
        &config_path,
        "filter_id_prefix: saved\nsystem_filter_files:\n  - contacts.yaml\n",
    )
    .unwrap();
    EngineConfig::from_yaml_file(&config_path).unwrap()
}

#[test]
fn test_config_file_resolves_relative_paths() {
    let dir = TempDir::new().unwrap();
    let config = write_system_filters(&dir);

    assert_eq!(config.filter_id_prefix, "saved");
    assert_eq!(config.max_depth, 32);
    assert_eq!(config.system_filter_files, vec![dir.path().join("contacts.yaml")]);
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let result = EngineConfig::from_yaml_file(dir.path().join("missing.yaml"));
    assert!(matches!(result, Err(SdkError::IoError(_))));
}

#[test]
fn test_system_filters_are_installed() {
    let dir = TempDir::new().unwrap();
    let config = write_system_filters(&dir);
    let t = TestEngine::with_builder(FilterEngineBuilder::new().with_config(config));
    let u = t.user("u");
    let ikari = FilterId::new("contacts_ikari");

    let installed = t.engine.filter(&ikari).unwrap();
    assert!(!installed.is_custom);
    assert_eq!(t.engine.apply(&u, &ikari).unwrap(), vec!["c1", "c2"]);
    assert_eq!(
        t.engine.apply(&u, &FilterId::new("contacts_vip")).unwrap(),
        vec!["c3"]
    );

    // system filters keep their name and cannot be deleted, even by admins
    let admin = t.admin();
    assert!(t.engine.rename(&admin, &ikari, "Ikaris").unwrap_err().is_validation());
    assert!(t.engine.delete(&admin, &ikari).unwrap_err().is_validation());
    let (allowed, reason) = t.engine.can_rename(&admin, &ikari).unwrap();
    assert!(!allowed);
    assert!(reason.unwrap().contains("system filter"));

    // but users may build on them
    let created = t
        .engine
        .create(
            &u,
            FilterRequest::new("Ikari VIPs", "Contact")
                .with_condition(ConditionDescriptor::sub_filter("contacts_ikari"))
                .with_condition(ConditionDescriptor::sub_filter("contacts_vip"))
                .with_use_or(true),
        )
        .unwrap();
    assert_eq!(created.id.as_str(), "saved_contact-1");
    assert_eq!(t.engine.apply(&u, &created.id).unwrap(), vec!["c1", "c2", "c3"]);
}

#[test]
fn test_broken_system_filter_fails_the_build() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(
        &path,
        r#"
- id: by_nickname
  name: By nickname
  entity_type: Contact
  conditions:
    - { kind: 5, ref: nickname, value: { operator: 1, values: ["Rei"] } }
"#,
    )
    .unwrap();

    let result = TestEngine::try_with_builder(FilterEngineBuilder::new().add_system_filter_file(&path));
    assert!(matches!(result, Err(SdkError::ConfigError(_))));
}

#[test]
fn test_system_filter_conditions_are_revalidated() {
    let gt_on_name = Condition::new(
        HandlerKind::RegularField,
        "last_name",
        ConditionValue::Field {
            operator: OperatorId::GT,
            values: vec![Value::from("Ikari")],
        },
    )
    .unwrap();
    let filter =
        EntityFilter::new("after_ikari", "After Ikari", "Contact", vec![gt_on_name]).unwrap();
    let repository = Arc::new(MemoryFilterRepository::new());

    let result = TestEngine::try_with_builder(
        FilterEngineBuilder::new()
            .with_repository(repository.clone())
            .add_system_filter(filter),
    );
    let err = result.err().unwrap();
    assert!(matches!(err, SdkError::ConfigError(_)));
    assert!(err.to_string().contains("last_name"));
    assert_eq!(repository.len(), 0);
}

#[test]
fn test_credentials_system_filter_rejects_sub_filters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.yaml");
    std::fs::write(
        &path,
        r#"
- id: ikari
  name: Ikari
  entity_type: Contact
  filter_type: credentials
  conditions:
    - { kind: 5, ref: last_name, value: { operator: 1, values: ["Ikari"] } }
- id: ikari_access
  name: Ikari access
  entity_type: Contact
  filter_type: credentials
  conditions:
    - { kind: 1, ref: ikari }
"#,
    )
    .unwrap();

    let result = TestEngine::try_with_builder(FilterEngineBuilder::new().add_system_filter_file(&path));
    let err = result.err().unwrap();
    assert!(matches!(err, SdkError::ConfigError(_)));
    assert!(err.to_string().contains("ikari_access"));
}

#[test]
fn test_system_filter_cycle_fails_the_build() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cycle.yaml");
    std::fs::write(
        &path,
        r#"
- { id: a, name: A, entity_type: Contact, conditions: [ { kind: 1, ref: b } ] }
- { id: b, name: B, entity_type: Contact, conditions: [ { kind: 1, ref: a } ] }
"#,
    )
    .unwrap();

    let err = TestEngine::try_with_builder(FilterEngineBuilder::new().add_system_filter_file(&path))
        .err()
        .unwrap();
    assert!(err.is_validation());
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_file_repository_survives_rebuild() {
    let dir = TempDir::new().unwrap();
    let config = write_system_filters(&dir);
    let store = dir.path().join("filters.json");

    {
        let repository = Arc::new(FileFilterRepository::open(&store).unwrap());
        let t = TestEngine::with_builder(
            FilterEngineBuilder::new()
                .with_config(config.clone())
                .with_repository(repository),
        );
        t.engine
            .create(
                &t.user("u"),
                FilterRequest::new("Young", "Contact")
                    .with_id("young")
                    .with_condition(ConditionDescriptor::regular_field(
                        "age",
                        OperatorId::LT,
                        [18.0],
                    )),
            )
            .unwrap();
    }

    // installed filters are found in the file and not installed twice
    let repository = Arc::new(FileFilterRepository::open(&store).unwrap());
    assert_eq!(repository.len(), 3);
    let t = TestEngine::with_builder(
        FilterEngineBuilder::new()
            .with_config(config)
            .with_repository(repository.clone()),
    );
    assert_eq!(repository.len(), 3);
    assert_eq!(
        t.engine.apply(&t.user("v"), &FilterId::new("young")).unwrap(),
        vec!["c1", "c3"]
    );
}

#[test]
fn test_declared_filter_type() {
    let config = EngineConfig::new().with_filter_type(
        FilterTypeConfig::new("reporting")
            .with_handler(HandlerKind::RegularField)
            .with_handler(HandlerKind::SubFilter),
    );
    let t = TestEngine::with_builder(FilterEngineBuilder::new().with_config(config));
    let u = t.user("u");
    let reporting = FilterType::Custom("reporting".to_string());

    let base = t
        .engine
        .create(
            &u,
            FilterRequest::new("Ikari", "Contact")
                .with_id("r1")
                .with_filter_type(reporting.clone())
                .with_condition(ConditionDescriptor::regular_field(
                    "last_name",
                    OperatorId::EQUALS,
                    ["Ikari"],
                )),
        )
        .unwrap();
    assert_eq!(base.filter_type, reporting);

    // properties are not declared for this type
    let err = t
        .engine
        .create(
            &u,
            FilterRequest::new("VIP", "Contact")
                .with_filter_type(reporting.clone())
                .with_condition(ConditionDescriptor::property("vip", true)),
        )
        .unwrap_err();
    assert!(err.is_config());

    // sub-filters must share the filter type
    let err = t
        .engine
        .create(
            &u,
            FilterRequest::new("Regular parent", "Contact")
                .with_condition(ConditionDescriptor::sub_filter("r1")),
        )
        .unwrap_err();
    assert!(err.is_config());

    // undeclared filter types have no registry
    let err = t
        .engine
        .create(
            &u,
            FilterRequest::new("Unknown", "Contact")
                .with_filter_type(FilterType::Custom("billing".to_string()))
                .with_condition(ConditionDescriptor::property("vip", true)),
        )
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_unknown_operand_in_declared_filter_type() {
    let config = EngineConfig::new()
        .with_filter_type(FilterTypeConfig::new("reporting").with_operand("__nobody__"));
    let result = TestEngine::try_with_builder(FilterEngineBuilder::new().with_config(config));
    assert!(matches!(result, Err(SdkError::ConfigError(_))));
}
