//! File-backed filter repository
//!
//! Keeps the whole filter set in memory and rewrites a single JSON document
//! after every mutation. The document is written to a sibling temporary file
//! and renamed over the previous one, so a crash leaves either the old or the
//! new set on disk. A failed write rolls the in-memory change back.

use crate::error::{RepositoryError, RepositoryResult};
use crate::memory::MemoryFilterRepository;
use crate::traits::FilterRepository;
use efilter_core::filter::StoredFilter;
use efilter_core::{EntityFilter, FilterId, FilterSource};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Filters persisted to one JSON file
#[derive(Debug)]
pub struct FileFilterRepository {
    path: PathBuf,
    inner: MemoryFilterRepository,
    write_lock: Mutex<()>,
}

impl FileFilterRepository {
    /// Open the repository at `path`, creating an empty one if the file is missing
    pub fn open(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            return Err(RepositoryError::InvalidPath { path });
        }

        let inner = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let stored: Vec<StoredFilter> = if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)?
            };
            let origin = path.display().to_string();
            let filters = stored
                .into_iter()
                .map(|s| {
                    EntityFilter::try_from(s).map_err(|message| RepositoryError::InvalidFilter {
                        path: origin.clone(),
                        message,
                    })
                })
                .collect::<RepositoryResult<Vec<_>>>()?;
            info!(path = %origin, "opened filter repository with {} filter(s)", filters.len());
            MemoryFilterRepository::with_filters(filters)?
        } else {
            debug!(path = %path.display(), "creating empty filter repository");
            MemoryFilterRepository::new()
        };

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self) -> RepositoryResult<()> {
        let stored: Vec<StoredFilter> = self
            .inner
            .snapshot()
            .into_iter()
            .map(StoredFilter::from)
            .collect();
        let content = serde_json::to_string_pretty(&stored)?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), "persisted {} filter(s)", stored.len());
        Ok(())
    }
}

impl FilterSource for FileFilterRepository {
    fn filter(&self, id: &FilterId) -> Option<EntityFilter> {
        self.inner.filter(id)
    }

    fn filters(&self) -> Vec<EntityFilter> {
        self.inner.filters()
    }
}

impl FilterRepository for FileFilterRepository {
    fn insert(&self, filter: EntityFilter) -> RepositoryResult<()> {
        let _guard = self.lock();
        let id = filter.id.clone();
        self.inner.insert(filter)?;
        if let Err(e) = self.persist() {
            warn!(filter = %id, error = %e, "persist failed, rolling back insert");
            let _ = self.inner.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    fn save(&self, filter: EntityFilter) -> RepositoryResult<()> {
        let _guard = self.lock();
        let previous = self
            .inner
            .filter(&filter.id)
            .ok_or_else(|| RepositoryError::NotFound {
                id: filter.id.to_string(),
            })?;
        self.inner.save(filter)?;
        if let Err(e) = self.persist() {
            warn!(filter = %previous.id, error = %e, "persist failed, rolling back save");
            let _ = self.inner.save(previous);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, id: &FilterId) -> RepositoryResult<EntityFilter> {
        let _guard = self.lock();
        let removed = self.inner.remove(id)?;
        if let Err(e) = self.persist() {
            warn!(filter = %id, error = %e, "persist failed, rolling back remove");
            let _ = self.inner.insert(removed);
            return Err(e);
        }
        Ok(removed)
    }

    fn next_id(&self, prefix: &str, entity_type: &str) -> FilterId {
        self.inner.next_id(prefix, entity_type)
    }

    fn as_source(&self) -> &dyn FilterSource {
        self
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
