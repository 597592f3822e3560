use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::MediaIndex;
use crate::models::{EntryId, Filter, MediaCollection, MediaEntry, NewEntry};
use crate::{Error, Result};

const STORAGE_ROOT: &str = "/storage/emulated/0";

/// In-memory stand-in for the platform media index.
#[derive(Default)]
pub(crate) struct MemoryIndex {
    rows: Mutex<Vec<MemoryRow>>,
    next_id: AtomicU64,
    /// Writers fail once they have accepted this many bytes.
    write_budget: Option<usize>,
    fail_queries: bool,
    pub inserts: AtomicUsize,
    pub writers_opened: AtomicUsize,
}

struct MemoryRow {
    id: EntryId,
    collection: MediaCollection,
    display_name: String,
    mime_type: String,
    relative_path: String,
    pending: bool,
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemoryRow {
    fn data_path(&self) -> PathBuf {
        PathBuf::from(STORAGE_ROOT)
            .join(&self.relative_path)
            .join(&self.display_name)
    }

    fn to_entry(&self) -> MediaEntry {
        MediaEntry {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            size: self.data.lock().unwrap().len() as u64,
            mime_type: self.mime_type.clone(),
            relative_path: Some(self.relative_path.clone()),
            data_path: Some(self.data_path()),
            pending: self.pending,
        }
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes_after(bytes: usize) -> Self {
        MemoryIndex {
            write_budget: Some(bytes),
            ..Self::default()
        }
    }

    pub fn failing_queries() -> Self {
        MemoryIndex {
            fail_queries: true,
            ..Self::default()
        }
    }

    /// Adds a visible entry, as if another application had published it.
    pub fn seed(&self, collection: MediaCollection, relative_path: &str, name: &str, bytes: &[u8]) -> EntryId {
        let id = self.next_entry_id(collection);
        self.rows.lock().unwrap().push(MemoryRow {
            id: id.clone(),
            collection,
            display_name: name.to_string(),
            mime_type: crate::models::mime_type_of(name),
            relative_path: relative_path.to_string(),
            pending: false,
            data: Arc::new(Mutex::new(bytes.to_vec())),
        });
        id
    }

    /// Every row, pending or not.
    pub fn all(&self) -> Vec<MediaEntry> {
        self.rows.lock().unwrap().iter().map(MemoryRow::to_entry).collect()
    }

    pub fn bytes_of(&self, id: &EntryId) -> Option<Vec<u8>> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| &row.id == id)
            .map(|row| row.data.lock().unwrap().clone())
    }

    fn next_entry_id(&self, collection: MediaCollection) -> EntryId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        EntryId(format!("{}/{}", collection.content_uri(), n))
    }
}

impl MediaIndex for MemoryIndex {
    fn query(&self, collection: MediaCollection, filter: &Filter) -> Result<Vec<MediaEntry>> {
        if self.fail_queries {
            return Err(Error::Index("query refused".to_string()));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.collection == collection && !row.pending)
            .map(MemoryRow::to_entry)
            .filter(|entry| match filter {
                Filter::Id { id } => &entry.id == id,
                Filter::DataPath { path } => entry.data_path.as_ref() == Some(path),
                Filter::NameAndSize { name, size } => {
                    &entry.display_name == name && entry.size == *size
                }
            })
            .collect())
    }

    fn insert(&self, collection: MediaCollection, entry: &NewEntry) -> Result<EntryId> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let id = self.next_entry_id(collection);
        self.rows.lock().unwrap().push(MemoryRow {
            id: id.clone(),
            collection,
            display_name: entry.display_name.clone(),
            mime_type: entry.mime_type.clone(),
            relative_path: entry
                .relative_path
                .clone()
                .unwrap_or_else(|| collection.default_directory().dir_name().to_string()),
            pending: entry.pending,
            data: Arc::new(Mutex::new(Vec::new())),
        });
        Ok(id)
    }

    fn open_writer(&self, id: &EntryId) -> Result<Box<dyn Write + Send>> {
        self.writers_opened.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        let row = rows
            .iter()
            .find(|row| &row.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        row.data.lock().unwrap().clear();
        Ok(Box::new(MemoryWriter {
            data: row.data.clone(),
            budget: self.write_budget,
        }))
    }

    fn set_pending(&self, id: &EntryId, pending: bool) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        row.pending = pending;
        Ok(())
    }

    fn delete(&self, id: &EntryId) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| &row.id != id);
        if rows.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

struct MemoryWriter {
    data: Arc<Mutex<Vec<u8>>>,
    budget: Option<usize>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let accepted = match self.budget {
            Some(0) => return Err(io::Error::new(io::ErrorKind::Other, "no space left")),
            Some(budget) => budget.min(buf.len()),
            None => buf.len(),
        };
        if let Some(budget) = self.budget.as_mut() {
            *budget -= accepted;
        }
        self.data.lock().unwrap().extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
