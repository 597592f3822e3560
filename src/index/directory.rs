use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::MediaIndex;
use crate::models::{mime_type_of, EntryId, Filter, MediaCollection, MediaEntry, NewEntry};
use crate::resolver::classify;
use crate::{Error, Result};

const PENDING_PREFIX: &str = ".pending-";

/// A media index backed by a directory tree and a JSON manifest.
///
/// Files live at `<root>/<relative path>/<file name>`. While an entry is
/// pending its bytes sit under a hidden `.pending-<uuid>-<name>` file in the
/// same directory and are renamed into place when the flag is cleared.
pub struct FsMediaIndex {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: Mutex<Manifest>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    next_id: u64,
    rows: Vec<Row>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    id: u64,
    collection: MediaCollection,
    display_name: String,
    mime_type: String,
    relative_path: String,
    file_name: String,
    staging_name: Option<String>,
    size: u64,
}

impl Row {
    fn entry_id(&self) -> EntryId {
        EntryId(format!("{}/{}", self.collection.content_uri(), self.id))
    }

    fn pending(&self) -> bool {
        self.staging_name.is_some()
    }

    fn final_path(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_path).join(&self.file_name)
    }

    fn current_path(&self, root: &Path) -> PathBuf {
        match &self.staging_name {
            Some(staging) => root.join(&self.relative_path).join(staging),
            None => self.final_path(root),
        }
    }

    fn to_entry(&self, root: &Path) -> MediaEntry {
        MediaEntry {
            id: self.entry_id(),
            display_name: self.display_name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            relative_path: Some(self.relative_path.clone()),
            data_path: Some(self.final_path(root)),
            pending: self.pending(),
        }
    }
}

impl FsMediaIndex {
    /// Opens the index rooted at `root`, loading `manifest_path` if it exists.
    ///
    /// Entries left pending by an interrupted copy are deleted, and visible
    /// entries whose file vanished are dropped.
    pub fn open(root: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let manifest_path = manifest_path.into();
        fs::create_dir_all(&root)?;

        let manifest = match fs::read(&manifest_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(e.into()),
        };

        let index = FsMediaIndex {
            root,
            manifest_path,
            manifest: Mutex::new(manifest),
        };
        index.prune()?;
        Ok(index)
    }

    /// Location of a visible entry's bytes.
    pub fn data_path(&self, id: &EntryId) -> Result<Option<PathBuf>> {
        let manifest = self.lock()?;
        Ok(manifest
            .rows
            .iter()
            .find(|row| !row.pending() && &row.entry_id() == id)
            .map(|row| row.final_path(&self.root)))
    }

    /// File behind a shareable identifier: a `file://` URL or a visible entry.
    pub fn file_for(&self, target: &EntryId) -> Result<PathBuf> {
        if target.as_str().starts_with("file:") {
            return url::Url::parse(target.as_str())
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| Error::InvalidArgs(format!("Malformed file URL: {}", target)));
        }
        self.data_path(target)?
            .ok_or_else(|| Error::NotFound(target.to_string()))
    }

    /// Registers a file that already sits under the root, the way a media
    /// scan would. Files outside the root, staging files and files of
    /// another collection are left alone.
    fn scan(&self, manifest: &mut Manifest, collection: MediaCollection, path: &Path) -> Result<Option<Row>> {
        let (Ok(file), Ok(root)) = (fs::canonicalize(path), fs::canonicalize(&self.root)) else {
            return Ok(None);
        };
        let Ok(relative) = file.strip_prefix(&root) else {
            return Ok(None);
        };
        let metadata = match fs::metadata(&file) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Ok(None),
        };
        let Some(file_name) = relative.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        if file_name.starts_with(PENDING_PREFIX) {
            return Ok(None);
        }
        let mime_type = mime_type_of(file_name);
        if classify(&mime_type).collection != collection {
            return Ok(None);
        }
        let Some(relative_path) = relative.parent().and_then(|p| p.to_str()) else {
            return Ok(None);
        };

        manifest.next_id += 1;
        let row = Row {
            id: manifest.next_id,
            collection,
            display_name: file_name.to_string(),
            mime_type,
            relative_path: relative_path.to_string(),
            file_name: file_name.to_string(),
            staging_name: None,
            size: metadata.len(),
        };
        manifest.rows.push(row.clone());
        self.save(manifest)?;
        debug!("Indexed existing file {} as {}", file.display(), row.entry_id());
        Ok(Some(row))
    }

    fn prune(&self) -> Result<()> {
        let mut manifest = self.lock()?;
        let before = manifest.rows.len();
        let root = &self.root;
        manifest.rows.retain(|row| {
            if row.pending() {
                warn!("Discarding interrupted copy of {}", row.display_name);
                remove_if_exists(&row.current_path(root));
                return false;
            }
            let present = row.final_path(root).is_file();
            if !present {
                warn!("Dropping {} from the index, its file is gone", row.entry_id());
            }
            present
        });
        if manifest.rows.len() != before {
            self.save(&manifest)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Manifest>> {
        self.manifest
            .lock()
            .map_err(|e| Error::Index(format!("Failed to lock index: {}", e)))
    }

    fn save(&self, manifest: &Manifest) -> Result<()> {
        let dir = self
            .manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, manifest)?;
        temp.flush()?;
        temp.persist(&self.manifest_path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn unique_file_name(&self, manifest: &Manifest, relative_path: &str, name: &str) -> String {
        let dir = self.root.join(relative_path);
        let taken = |candidate: &str| {
            dir.join(candidate).exists()
                || manifest
                    .rows
                    .iter()
                    .any(|row| row.relative_path == relative_path && row.file_name == candidate)
        };
        if !taken(name) {
            return name.to_string();
        }
        let (stem, extension) = match name.rfind('.') {
            Some(index) if index > 0 => (&name[..index], &name[index..]),
            _ => (name, ""),
        };
        (1..)
            .map(|n| format!("{} ({}){}", stem, n, extension))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

impl MediaIndex for FsMediaIndex {
    fn query(&self, collection: MediaCollection, filter: &Filter) -> Result<Vec<MediaEntry>> {
        let mut manifest = self.lock()?;
        let wanted_path = match filter {
            Filter::DataPath { path } => Some(normalize(path)),
            _ => None,
        };
        let found: Vec<MediaEntry> = manifest
            .rows
            .iter()
            .filter(|row| row.collection == collection && !row.pending())
            .filter(|row| match filter {
                Filter::Id { id } => &row.entry_id() == id,
                Filter::DataPath { .. } => {
                    Some(normalize(&row.final_path(&self.root))) == wanted_path
                }
                Filter::NameAndSize { name, size } => {
                    &row.display_name == name && row.size == *size
                }
            })
            .map(|row| row.to_entry(&self.root))
            .collect();

        if let (true, Filter::DataPath { path }) = (found.is_empty(), filter) {
            if let Some(row) = self.scan(&mut manifest, collection, path)? {
                return Ok(vec![row.to_entry(&self.root)]);
            }
        }
        Ok(found)
    }

    fn insert(&self, collection: MediaCollection, entry: &NewEntry) -> Result<EntryId> {
        let relative_path = match &entry.relative_path {
            Some(path) => checked_relative_path(path)?,
            None => collection.default_directory().dir_name().to_string(),
        };
        let display_name = Path::new(&entry.display_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidArgs("Invalid display name.".to_string()))?
            .to_string();

        let mut manifest = self.lock()?;
        let file_name = self.unique_file_name(&manifest, &relative_path, &display_name);
        let staging_name = entry
            .pending
            .then(|| format!("{}{}-{}", PENDING_PREFIX, uuid::Uuid::new_v4(), file_name));

        manifest.next_id += 1;
        let row = Row {
            id: manifest.next_id,
            collection,
            display_name,
            mime_type: entry.mime_type.clone(),
            relative_path,
            file_name,
            staging_name,
            size: 0,
        };

        let path = row.current_path(&self.root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;

        let id = row.entry_id();
        manifest.rows.push(row);
        if let Err(e) = self.save(&manifest) {
            manifest.rows.pop();
            remove_if_exists(&path);
            return Err(e);
        }
        debug!("Inserted {} at {}", id, path.display());
        Ok(id)
    }

    fn open_writer(&self, id: &EntryId) -> Result<Box<dyn Write + Send>> {
        let manifest = self.lock()?;
        let row = manifest
            .rows
            .iter()
            .find(|row| &row.entry_id() == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let file = File::create(row.current_path(&self.root))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn set_pending(&self, id: &EntryId, pending: bool) -> Result<()> {
        let mut manifest = self.lock()?;
        let position = manifest
            .rows
            .iter()
            .position(|row| &row.entry_id() == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if manifest.rows[position].pending() == pending {
            return Ok(());
        }

        let from = manifest.rows[position].current_path(&self.root);
        if pending {
            let staging = format!(
                "{}{}-{}",
                PENDING_PREFIX,
                uuid::Uuid::new_v4(),
                manifest.rows[position].file_name
            );
            manifest.rows[position].staging_name = Some(staging);
        } else {
            // The name reserved at insert time may have been taken since.
            let row = &manifest.rows[position];
            if row.final_path(&self.root).exists() {
                let fresh = self.unique_file_name(&manifest, &row.relative_path, &row.display_name);
                warn!("{} appeared during the copy, publishing as {}", row.file_name, fresh);
                manifest.rows[position].file_name = fresh;
            }
            manifest.rows[position].staging_name = None;
        }
        let to = manifest.rows[position].current_path(&self.root);
        fs::rename(&from, &to)?;
        manifest.rows[position].size = fs::metadata(&to)?.len();
        self.save(&manifest)
    }

    fn delete(&self, id: &EntryId) -> Result<()> {
        let mut manifest = self.lock()?;
        let position = manifest
            .rows
            .iter()
            .position(|row| &row.entry_id() == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let row = manifest.rows.remove(position);
        remove_if_exists(&row.current_path(&self.root));
        self.save(&manifest)
    }
}

fn checked_relative_path(path: &str) -> Result<String> {
    let trimmed = path.trim_matches('/');
    let valid = Path::new(trimmed)
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !valid {
        return Err(Error::InvalidArgs(format!(
            "Relative path must stay inside shared storage: {}",
            path
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
