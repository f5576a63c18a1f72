//! Persistence layer for entity filters
//!
//! This crate stores filters and the external records that reference them:
//!
//! - **Memory Repository**: filters held in memory, atomic per-filter writes
//! - **File Repository**: the memory repository mirrored to a JSON file
//! - **System Filter Loader**: installed (non-custom) filters from YAML/JSON files
//! - **External References**: records outside the filter set that use a filter
//!
//! # Quick Start
//!
//! ```no_run
//! use efilter_repository::{FilterRepository, MemoryFilterRepository, SystemFilterLoader};
//!
//! fn main() -> anyhow::Result<()> {
//!     let repo = MemoryFilterRepository::new();
//!     for filter in SystemFilterLoader::load_file("filters/contacts.yaml")? {
//!         repo.insert(filter)?;
//!     }
//!     println!("{} filters installed", repo.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file;
pub mod loader;
pub mod memory;
pub mod references;
pub mod traits;

pub use error::{RepositoryError, RepositoryResult};
pub use file::FileFilterRepository;
pub use loader::SystemFilterLoader;
pub use memory::MemoryFilterRepository;
pub use references::MemoryReferences;
pub use traits::FilterRepository;
