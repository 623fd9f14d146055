use std::{
    path::{Path, PathBuf},
    pin::pin,
};

use futures::StreamExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::utils::clock::Clock;

use super::{
    entities::CategoryEntity,
    session_store::{category_sessions, SessionStore, StorageError},
};

/// Categories a fresh install starts out with. The file is plain JSON, so
/// users who want a different set from day one can also just edit it.
const PRESET_CATEGORIES: [&str; 3] = ["Writing", "Coding", "Reading"];

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("category '{0}' already exists")]
    Duplicate(String),
    #[error("category '{0}' does not exist")]
    NotFound(String),
    #[error("category '{0}' is still referenced by recorded sessions")]
    InUse(String),
    #[error("category names cannot be empty")]
    EmptyName,
    #[error("failed to persist categories: {0}")]
    Store(#[source] std::io::Error),
    #[error("failed to encode categories: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to scan sessions for references: {0}")]
    Scan(#[from] StorageError),
}

/// The set of user defined categories, kept in creation order and persisted
/// as a single JSON array.
///
/// Mutations rewrite the whole file. It stays tiny, and rewriting only after
/// the in-memory change is known good means a failed write never leaves the
/// two out of sync: the file simply keeps its previous content.
pub struct CategoryRegistry {
    path: PathBuf,
    categories: Vec<CategoryEntity>,
    clock: Box<dyn Clock>,
}

impl CategoryRegistry {
    /// Loads the registry, seeding the preset list on first run. A file that
    /// doesn't parse is left untouched on disk and the registry starts
    /// empty, the next successful mutation rewrites it.
    pub async fn load(path: PathBuf, clock: Box<dyn Clock>) -> Self {
        let categories = match tokio::fs::read(&path).await {
            Ok(content) => match serde_json::from_slice::<Vec<CategoryEntity>>(&content) {
                Ok(categories) => categories,
                Err(e) => {
                    warn!("Category file {path:?} is malformed, starting empty: {e}");
                    vec![]
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No category file yet, seeding presets");
                let now = clock.time();
                let presets = PRESET_CATEGORIES
                    .iter()
                    .map(|name| CategoryEntity {
                        name: (*name).into(),
                        created_at: now,
                    })
                    .collect::<Vec<_>>();
                if let Err(e) = write_categories(&path, &presets).await {
                    warn!("Couldn't write preset categories: {e}");
                }
                presets
            }
            Err(e) => {
                warn!("Couldn't read category file {path:?}, starting empty: {e}");
                vec![]
            }
        };

        Self {
            path,
            categories,
            clock,
        }
    }

    /// Categories in creation order.
    pub fn list(&self) -> &[CategoryEntity] {
        &self.categories
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name.as_ref() == name)
    }

    pub async fn create(&mut self, name: &str) -> Result<(), CategoryError> {
        if name.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        if self.contains(name) {
            return Err(CategoryError::Duplicate(name.to_string()));
        }

        let mut next = self.categories.clone();
        next.push(CategoryEntity {
            name: name.into(),
            created_at: self.clock.time(),
        });
        self.persist(next).await
    }

    /// Renames a category. Recorded sessions keep the name they were logged
    /// under, history is never rewritten.
    pub async fn rename(&mut self, old: &str, new: &str) -> Result<(), CategoryError> {
        if new.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        let Some(position) = self.position(old) else {
            return Err(CategoryError::NotFound(old.to_string()));
        };
        if self.contains(new) {
            return Err(CategoryError::Duplicate(new.to_string()));
        }

        let mut next = self.categories.clone();
        next[position].name = new.into();
        self.persist(next).await
    }

    /// Deletes a category, refusing while any stored session still
    /// references it.
    pub async fn delete<S: SessionStore + Send + Sync>(
        &mut self,
        name: &str,
        store: S,
    ) -> Result<(), CategoryError> {
        let Some(position) = self.position(name) else {
            return Err(CategoryError::NotFound(name.to_string()));
        };

        let category = self.categories[position].name.clone();
        let mut references = pin!(category_sessions(store, category));
        if let Some(first) = references.next().await {
            first?;
            return Err(CategoryError::InUse(name.to_string()));
        }

        let mut next = self.categories.clone();
        next.remove(position);
        self.persist(next).await
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.name.as_ref() == name)
    }

    async fn persist(&mut self, categories: Vec<CategoryEntity>) -> Result<(), CategoryError> {
        write_categories(&self.path, &categories).await?;
        self.categories = categories;
        Ok(())
    }
}

async fn write_categories(
    path: &Path,
    categories: &[CategoryEntity],
) -> Result<(), CategoryError> {
    let encoded = serde_json::to_vec_pretty(categories)?;
    tokio::fs::write(path, encoded)
        .await
        .map_err(CategoryError::Store)
}
