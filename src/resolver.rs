use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::index::MediaIndex;
use crate::models::{
    mime_type_of, Classification, EntryId, Filter, LocalFile, MediaCollection, MediaEntry,
    StandardDirectory,
};
use crate::storage::StorageMode;
use crate::{Error, Result};

const COPY_CHUNK_SIZE: usize = 8192;

/// Maps a MIME type to its media collection and suggested directory.
///
/// Only the prefix matters, so `image`, `image/png` and `image/*` classify
/// the same way. Anything unrecognised, the empty string included, lands in
/// the generic files collection under `Documents`.
pub fn classify(mime_type: &str) -> Classification {
    let (collection, directory) = if mime_type.starts_with("image") {
        (MediaCollection::Images, StandardDirectory::Pictures)
    } else if mime_type.starts_with("video") {
        (MediaCollection::Video, StandardDirectory::Pictures)
    } else if mime_type.starts_with("audio") {
        (MediaCollection::Audio, StandardDirectory::Music)
    } else {
        (MediaCollection::Files, StandardDirectory::Documents)
    };
    Classification {
        collection,
        directory,
    }
}

/// Finds or creates shared-storage entries for local files.
pub struct UriResolver<I> {
    index: I,
    mode: StorageMode,
    default_subdirectory: Option<String>,
}

impl<I: MediaIndex> UriResolver<I> {
    pub fn new(index: I, mode: StorageMode) -> Self {
        UriResolver {
            index,
            mode,
            default_subdirectory: None,
        }
    }

    /// Subdirectory used by copies that carry no hint of their own.
    pub fn with_default_subdirectory(mut self, subdirectory: Option<String>) -> Self {
        self.default_subdirectory = subdirectory;
        self
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Entry whose stored data path equals `path`.
    pub fn resolve_existing_entry(&self, path: &Path) -> Option<EntryId> {
        let name = path.file_name()?.to_str()?;
        let collection = classify(&mime_type_of(name)).collection;
        self.first_match(
            collection,
            &Filter::DataPath {
                path: path.to_path_buf(),
            },
        )
    }

    /// Entry already shared under the same display name and size.
    ///
    /// Two different files with equal name and size are taken for the same
    /// file, and a renamed copy is not recognised.
    pub fn resolve_duplicate(&self, name: &str, size: u64) -> Option<EntryId> {
        let collection = classify(&mime_type_of(name)).collection;
        self.first_match(
            collection,
            &Filter::NameAndSize {
                name: name.to_string(),
                size,
            },
        )
    }

    /// Name, location and MIME type of an index entry.
    pub fn describe(&self, id: &EntryId) -> Option<MediaEntry> {
        let collection = MediaCollection::of_entry(id)?;
        match self.index.query(collection, &Filter::Id { id: id.clone() }) {
            Ok(entries) => entries.into_iter().next(),
            Err(e) => {
                warn!("Failed to describe {}: {}", id, e);
                None
            }
        }
    }

    /// Copies `local` into shared storage and returns the new entry.
    ///
    /// A duplicate (same name and size) is returned without copying. The
    /// entry stays pending until every byte is written; on failure it is
    /// deleted again and nothing becomes visible.
    pub fn copy_into_shared_storage(
        &self,
        local: &LocalFile,
        subdirectory: Option<&str>,
    ) -> Result<EntryId> {
        if let Some(id) = self.resolve_duplicate(&local.name, local.size) {
            debug!("{} is already shared as {}", local.name, id);
            return Ok(id);
        }

        let classification = classify(&local.mime_type);
        let subdirectory = subdirectory.or(self.default_subdirectory.as_deref());
        let entry = self.mode.new_entry(local, classification, subdirectory);
        let id = self.index.insert(classification.collection, &entry)?;
        debug!("Created pending entry {} for {}", id, local.path.display());

        let outcome = self
            .write_entry(&id, local)
            .and_then(|()| self.mode.publish(&self.index, &id));
        if let Err(e) = outcome {
            warn!("Copy of {} failed, removing {}: {}", local.name, id, e);
            if let Err(e) = self.index.delete(&id) {
                warn!("Failed to remove {}: {}", id, e);
            }
            return Err(Error::CopyFailed {
                name: local.name.clone(),
                reason: e.to_string(),
            });
        }

        info!("Copied {} ({} bytes) to {}", local.name, local.size, id);
        Ok(id)
    }

    /// Identifier to hand to the share surface for the file at `path`.
    ///
    /// Uses the existing entry if there is one, copies the file into shared
    /// storage otherwise, and falls back to a direct file reference when the
    /// copy fails.
    pub fn resolve_for_sharing(&self, path: &Path, subdirectory: Option<&str>) -> Result<EntryId> {
        let local = LocalFile::open(path)?;
        if let Some(id) = self.resolve_existing_entry(&local.path) {
            debug!("{} is indexed as {}", local.path.display(), id);
            return Ok(id);
        }
        match self.copy_into_shared_storage(&local, subdirectory) {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!("{}; sharing the file directly", e);
                self.index.file_reference(&local.path)
            }
        }
    }

    fn first_match(&self, collection: MediaCollection, filter: &Filter) -> Option<EntryId> {
        match self.index.query(collection, filter) {
            Ok(entries) => entries.into_iter().next().map(|entry| entry.id),
            Err(e) => {
                warn!("Media index query failed: {}", e);
                None
            }
        }
    }

    fn write_entry(&self, id: &EntryId, local: &LocalFile) -> Result<()> {
        let mut reader = File::open(&local.path)?;
        let mut writer = self.index.open_writer(id)?;
        let copied = copy_chunks(&mut reader, &mut writer)?;
        if copied != local.size {
            return Err(Error::CopyFailed {
                name: local.name.clone(),
                reason: format!("copied {} of {} bytes", copied, local.size),
            });
        }
        Ok(())
    }
}

fn copy_chunks<R, W>(reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = [0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    writer.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::MemoryIndex;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    fn local_file(dir: &tempfile::TempDir, name: &str, len: usize) -> LocalFile {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0x5a; len]).unwrap();
        LocalFile::open(path).unwrap()
    }

    fn resolver(index: MemoryIndex) -> UriResolver<MemoryIndex> {
        UriResolver::new(index, StorageMode::Scoped)
    }

    #[rstest]
    #[case("image/png", MediaCollection::Images, StandardDirectory::Pictures)]
    #[case("image/*", MediaCollection::Images, StandardDirectory::Pictures)]
    #[case("video/mp4", MediaCollection::Video, StandardDirectory::Pictures)]
    #[case("audio/mpeg", MediaCollection::Audio, StandardDirectory::Music)]
    #[case("application/pdf", MediaCollection::Files, StandardDirectory::Documents)]
    #[case("text/plain", MediaCollection::Files, StandardDirectory::Documents)]
    #[case("", MediaCollection::Files, StandardDirectory::Documents)]
    #[case("Image/png", MediaCollection::Files, StandardDirectory::Documents)]
    fn classify_by_prefix(
        #[case] mime_type: &str,
        #[case] collection: MediaCollection,
        #[case] directory: StandardDirectory,
    ) {
        assert_eq!(
            classify(mime_type),
            Classification {
                collection,
                directory
            }
        );
    }

    #[test]
    fn report_pdf_is_copied_once() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(&dir, "report.pdf", 12_000);
        let resolver = resolver(MemoryIndex::new());

        let first = resolver.copy_into_shared_storage(&local, None).unwrap();
        assert!(first.as_str().starts_with(MediaCollection::Files.content_uri()));
        let entries = resolver.index().all();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].pending);
        assert_eq!(entries[0].size, 12_000);
        assert_eq!(entries[0].relative_path.as_deref(), Some("Documents"));

        assert_eq!(resolver.resolve_duplicate("report.pdf", 12_000), Some(first.clone()));
        let second = resolver.copy_into_shared_storage(&local, None).unwrap();
        assert_eq!(second, first);
        assert_eq!(resolver.index().inserts.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.index().writers_opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn copied_entry_describes_itself() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(&dir, "holiday.jpg", 3_000);
        let resolver = resolver(MemoryIndex::new());

        let id = resolver.copy_into_shared_storage(&local, Some("Mask")).unwrap();
        let entry = resolver.describe(&id).unwrap();
        assert_eq!(entry.display_name, "holiday.jpg");
        assert_eq!(entry.mime_type, "image/jpeg");
        assert_eq!(entry.relative_path.as_deref(), Some("Pictures/Mask"));
        assert_eq!(resolver.index().bytes_of(&id).unwrap().len(), 3_000);
    }

    #[test]
    fn default_subdirectory_applies_without_hint() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(&dir, "notes.txt", 10);
        let resolver = resolver(MemoryIndex::new()).with_default_subdirectory(Some("Mask".into()));

        let id = resolver.copy_into_shared_storage(&local, None).unwrap();
        let entry = resolver.describe(&id).unwrap();
        assert_eq!(entry.relative_path.as_deref(), Some("Documents/Mask"));
    }

    #[test]
    fn failed_write_leaves_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(&dir, "report.pdf", 12_000);
        let resolver = resolver(MemoryIndex::failing_writes_after(8_192));

        let result = resolver.copy_into_shared_storage(&local, None);
        assert!(matches!(result, Err(Error::CopyFailed { .. })));
        assert!(resolver.index().all().is_empty());
        assert_eq!(resolver.resolve_duplicate("report.pdf", 12_000), None);
    }

    #[test]
    fn short_copy_leaves_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut local = local_file(&dir, "report.pdf", 12_000);
        // The file shrank after its metadata was read.
        local.size = 20_000;
        let resolver = resolver(MemoryIndex::new());

        let result = resolver.copy_into_shared_storage(&local, None);
        match result {
            Err(Error::CopyFailed { reason, .. }) => {
                assert!(reason.contains("12000 of 20000"), "{}", reason)
            }
            other => panic!("expected CopyFailed, got {:?}", other),
        }
        assert!(resolver.index().all().is_empty());
    }

    #[test]
    fn missing_local_file_fails_and_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(&dir, "gone.pdf", 5);
        std::fs::remove_file(&local.path).unwrap();
        let resolver = resolver(MemoryIndex::new());

        assert!(resolver.copy_into_shared_storage(&local, None).is_err());
        assert!(resolver.index().all().is_empty());
    }

    #[test]
    fn existing_entry_resolves_by_path() {
        let index = MemoryIndex::new();
        let id = index.seed(MediaCollection::Images, "DCIM/Camera", "IMG_1.jpg", b"jpeg");
        let resolver = resolver(index);

        let path = PathBuf::from("/storage/emulated/0/DCIM/Camera/IMG_1.jpg");
        assert_eq!(resolver.resolve_existing_entry(&path), Some(id));
        let other = PathBuf::from("/storage/emulated/0/DCIM/Camera/IMG_2.jpg");
        assert_eq!(resolver.resolve_existing_entry(&other), None);
    }

    #[test]
    fn query_errors_read_as_not_found() {
        let resolver = resolver(MemoryIndex::failing_queries());
        assert_eq!(resolver.resolve_duplicate("report.pdf", 1), None);
        assert_eq!(
            resolver.resolve_existing_entry(Path::new("/storage/emulated/0/a.png")),
            None
        );
    }

    #[test]
    fn legacy_mode_places_copies_in_default_directory() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(&dir, "song.mp3", 64);
        let resolver = UriResolver::new(MemoryIndex::new(), StorageMode::Legacy);

        let id = resolver.copy_into_shared_storage(&local, Some("Mask")).unwrap();
        let entry = resolver.describe(&id).unwrap();
        assert_eq!(entry.relative_path.as_deref(), Some("Music"));
    }

    #[test]
    fn sharing_prefers_existing_then_copy_then_file_reference() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_file(&dir, "report.pdf", 100);

        let copied = resolver(MemoryIndex::new())
            .resolve_for_sharing(&local.path, None)
            .unwrap();
        assert!(copied.as_str().starts_with("content://media/external/file/"));

        let fallback = resolver(MemoryIndex::failing_writes_after(0))
            .resolve_for_sharing(&local.path, None)
            .unwrap();
        assert!(fallback.as_str().starts_with("file://"), "{}", fallback);
        assert!(fallback.as_str().ends_with("report.pdf"));
    }

    #[test]
    fn sharing_an_unreadable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolver(MemoryIndex::new()).resolve_for_sharing(&dir.path().join("nope.pdf"), None);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn describe_ignores_foreign_identifiers() {
        let resolver = resolver(MemoryIndex::new());
        assert_eq!(resolver.describe(&EntryId::from("file:///tmp/a.txt")), None);
    }

    #[test]
    fn copy_chunks_counts_every_byte() {
        let data = vec![1u8; COPY_CHUNK_SIZE * 2 + 17];
        let mut out = Vec::new();
        let copied = copy_chunks(&mut data.as_slice(), &mut out).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }
}
