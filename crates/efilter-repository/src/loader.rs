//! System filter loader
//!
//! Installed filters ship as YAML or JSON files in the persisted shape:
//!
//! ```yaml
//! filters:
//!   - id: contacts_ikari
//!     name: Ikari family
//!     entity_type: Contact
//!     conditions:
//!       - kind: 5
//!         ref: last_name
//!         value: { operator: 5, values: ["Ikari"] }
//! ```
//!
//! A file may also hold a bare list of filters or a single filter. Loaded
//! filters are always system filters: never custom, never private.

use crate::error::{RepositoryError, RepositoryResult};
use efilter_core::filter::StoredFilter;
use efilter_core::EntityFilter;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Deserialize)]
struct FilterFile {
    filters: Vec<StoredFilter>,
}

/// Loads installed filters from files
pub struct SystemFilterLoader;

impl SystemFilterLoader {
    /// Load one file; `.json` files are read as JSON, anything else as YAML
    pub fn load_file(path: impl AsRef<Path>) -> RepositoryResult<Vec<EntityFilter>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RepositoryError::InvalidPath {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let origin = path.display().to_string();
        let filters = if path.extension().map_or(false, |ext| ext == "json") {
            Self::parse_json(&content, &origin)?
        } else {
            Self::parse_yaml(&content, &origin)?
        };
        info!(path = %origin, "loaded {} system filter(s)", filters.len());
        Ok(filters)
    }

    /// Load every `.yaml`, `.yml` and `.json` file of a directory, by file name
    pub fn load_dir(dir: impl AsRef<Path>) -> RepositoryResult<Vec<EntityFilter>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(RepositoryError::InvalidPath {
                path: dir.to_path_buf(),
            });
        }
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map_or(false, |ext| ext == "yaml" || ext == "yml" || ext == "json")
            })
            .collect();
        paths.sort();

        let mut filters = Vec::new();
        for path in paths {
            filters.extend(Self::load_file(&path)?);
        }
        Ok(filters)
    }

    pub fn parse_yaml(content: &str, origin: &str) -> RepositoryResult<Vec<EntityFilter>> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)?;
        Self::from_document(document, origin)
    }

    pub fn parse_json(content: &str, origin: &str) -> RepositoryResult<Vec<EntityFilter>> {
        let document: serde_yaml::Value = serde_json::from_str(content)?;
        Self::from_document(document, origin)
    }

    fn from_document(document: serde_yaml::Value, origin: &str) -> RepositoryResult<Vec<EntityFilter>> {
        let stored: Vec<StoredFilter> = match document {
            serde_yaml::Value::Null => Vec::new(),
            serde_yaml::Value::Sequence(_) => serde_yaml::from_value(document)?,
            serde_yaml::Value::Mapping(ref map) if map.contains_key("filters") => {
                serde_yaml::from_value::<FilterFile>(document)?.filters
            }
            _ => vec![serde_yaml::from_value(document)?],
        };

        stored
            .into_iter()
            .map(|stored| {
                let filter = EntityFilter::try_from(stored).map_err(|message| {
                    RepositoryError::InvalidFilter {
                        path: origin.to_string(),
                        message,
                    }
                })?;
                if filter.is_private() {
                    return Err(RepositoryError::InvalidFilter {
                        path: origin.to_string(),
                        message: format!("system filter '{}' cannot be private", filter.id),
                    });
                }
                debug!(filter = %filter.id, "system filter parsed");
                Ok(filter.system())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efilter_core::HandlerKind;

    const YAML: &str = r#"
filters:
  - id: contacts_ikari
    name: Ikari family
    entity_type: Contact
    conditions:
      - kind: 5
        ref: last_name
        value: { operator: 5, values: ["Ikari"] }
  - id: contacts_vip
    name: VIP contacts
    entity_type: Contact
    use_or: true
    conditions:
      - { kind: 15, ref: vip, value: { has: true } }
      - { kind: 1, ref: contacts_ikari }
"#;

    #[test]
    fn test_parse_wrapped_yaml() {
        let filters = SystemFilterLoader::parse_yaml(YAML, "inline").unwrap();
        assert_eq!(filters.len(), 2);
        assert!(filters.iter().all(|f| !f.is_custom));
        assert!(filters[1].use_or);
        assert_eq!(filters[1].conditions()[1].kind(), HandlerKind::SubFilter);
    }

    #[test]
    fn test_parse_json_list() {
        let json = r#"[{"id": "f", "name": "F", "entity_type": "Contact",
            "conditions": [{"kind": 15, "ref": "vip", "value": {"has": false}}]}]"#;
        let filters = SystemFilterLoader::parse_json(json, "inline").unwrap();
        assert_eq!(filters[0].id.as_str(), "f");
    }

    #[test]
    fn test_rejects_invalid_filters() {
        let empty = "id: f\nname: F\nentity_type: Contact\nconditions: []\n";
        assert!(matches!(
            SystemFilterLoader::parse_yaml(empty, "inline"),
            Err(RepositoryError::InvalidFilter { .. })
        ));

        let private = "id: f\nname: F\nentity_type: Contact\nowner: { user_id: u }\nconditions:\n  - { kind: 15, ref: vip, value: { has: true } }\n";
        assert!(matches!(
            SystemFilterLoader::parse_yaml(private, "inline"),
            Err(RepositoryError::InvalidFilter { .. })
        ));

        let operator_on_property = "id: f\nname: F\nentity_type: Contact\nconditions:\n  - { kind: 15, ref: vip, value: { has: true, operator: 1 } }\n";
        assert!(SystemFilterLoader::parse_yaml(operator_on_property, "inline").is_err());
    }
}
