use serde::{Deserialize, Serialize};

use crate::index::MediaIndex;
use crate::models::{Classification, EntryId, LocalFile, NewEntry};
use crate::Result;

/// How new entries are laid out in shared storage. Resolved once when the
/// plugin starts.
///
/// Scoped storage accepts a relative path per entry. Legacy storage places
/// every entry directly in its collection's default directory, so
/// subdirectory hints are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageMode {
    Scoped,
    Legacy,
}

impl StorageMode {
    pub fn from_capability(scoped_storage: bool) -> Self {
        if scoped_storage {
            StorageMode::Scoped
        } else {
            StorageMode::Legacy
        }
    }

    /// Row values for a pending copy of `local`.
    pub fn new_entry(
        &self,
        local: &LocalFile,
        classification: Classification,
        subdirectory: Option<&str>,
    ) -> NewEntry {
        NewEntry {
            display_name: local.name.clone(),
            mime_type: local.mime_type.clone(),
            relative_path: self.relative_path(classification, subdirectory),
            pending: true,
        }
    }

    fn relative_path(&self, classification: Classification, subdirectory: Option<&str>) -> Option<String> {
        match self {
            StorageMode::Legacy => None,
            StorageMode::Scoped => {
                let base = classification.directory.dir_name();
                match subdirectory.map(|s| s.trim_matches('/')) {
                    Some(sub) if !sub.is_empty() => Some(format!("{}/{}", base, sub)),
                    _ => Some(base.to_string()),
                }
            }
        }
    }

    /// Makes a fully written entry visible.
    pub fn publish<I: MediaIndex + ?Sized>(&self, index: &I, id: &EntryId) -> Result<()> {
        index.set_pending(id, false)
    }
}
