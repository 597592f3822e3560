use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Plugin configuration read from `plugins.media-share` in `tauri.conf.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Root of the shared storage tree on desktop. Defaults to the user's home directory.
    pub shared_root: Option<PathBuf>,
    /// Location of the desktop index manifest. Defaults to `<app data dir>/media-index.json`.
    pub index_file: Option<PathBuf>,
    /// Subdirectory used when a copy request carries no hint of its own.
    pub default_subdirectory: Option<String>,
    /// Title shown by the share chooser, where the platform supports one.
    pub chooser_title: Option<String>,
    /// Forces scoped (`true`) or legacy (`false`) storage on desktop.
    pub scoped_storage: Option<bool>,
}

/// One of the four collections of the platform media index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaCollection {
    Images,
    Video,
    Audio,
    Files,
}

impl MediaCollection {
    /// Base content URI of the collection, as exposed by Android's `MediaStore`.
    pub fn content_uri(&self) -> &'static str {
        match self {
            MediaCollection::Images => "content://media/external/images/media",
            MediaCollection::Video => "content://media/external/video/media",
            MediaCollection::Audio => "content://media/external/audio/media",
            MediaCollection::Files => "content://media/external/file",
        }
    }

    /// Directory new entries land in when no relative path is given.
    pub fn default_directory(&self) -> StandardDirectory {
        match self {
            MediaCollection::Images | MediaCollection::Video => StandardDirectory::Pictures,
            MediaCollection::Audio => StandardDirectory::Music,
            MediaCollection::Files => StandardDirectory::Documents,
        }
    }

    /// Collection an identifier was issued by, if it is a media index URI.
    pub fn of_entry(id: &EntryId) -> Option<MediaCollection> {
        [
            MediaCollection::Images,
            MediaCollection::Video,
            MediaCollection::Audio,
            MediaCollection::Files,
        ]
        .into_iter()
        .find(|collection| {
            id.as_str()
                .strip_prefix(collection.content_uri())
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Suggested top-level directory of shared storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StandardDirectory {
    Pictures,
    Music,
    Documents,
}

impl StandardDirectory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            StandardDirectory::Pictures => "Pictures",
            StandardDirectory::Music => "Music",
            StandardDirectory::Documents => "Documents",
        }
    }
}

/// Where a file of a given MIME type belongs in shared storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub collection: MediaCollection,
    pub directory: StandardDirectory,
}

/// Opaque identifier of a shareable file: a media index content URI, a
/// FileProvider URI or a `file://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        EntryId(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        EntryId(value.to_string())
    }
}

/// A record of the platform media index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    pub id: EntryId,
    pub display_name: String,
    pub size: u64,
    pub mime_type: String,
    pub relative_path: Option<String>,
    /// Absolute location of the bytes, when the index exposes it.
    pub data_path: Option<PathBuf>,
    pub pending: bool,
}

/// Query filter understood by every [`crate::MediaIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Filter {
    Id { id: EntryId },
    DataPath { path: PathBuf },
    NameAndSize { name: String, size: u64 },
}

/// Values of a row about to be inserted into the media index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub display_name: String,
    pub mime_type: String,
    /// `None` places the file directly in the collection's default directory.
    pub relative_path: Option<String>,
    pub pending: bool,
}

/// A file in private or legacy-accessible storage, with the metadata the
/// resolver needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub extension: String,
    pub mime_type: String,
    pub size: u64,
}

impl LocalFile {
    /// Reads the file's metadata. Fails when the path is not a readable regular file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::InvalidArgs(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidArgs("File name contains invalid UTF-8.".to_string()))?
            .to_string();

        Ok(LocalFile {
            path: path.to_path_buf(),
            extension: extension_of(&name).to_string(),
            mime_type: mime_type_of(&name),
            name,
            size: metadata.len(),
        })
    }
}

/// Extension after the last dot. Dotfiles such as `.profile` have none.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) if index > 0 => &name[index + 1..],
        _ => "",
    }
}

/// MIME type guessed from the name's extension.
pub fn mime_type_of(name: &str) -> String {
    let extension = extension_of(name);
    if extension.is_empty() {
        return FALLBACK_MIME_TYPE.to_string();
    }
    mime_guess::from_ext(extension)
        .first_raw()
        .unwrap_or(FALLBACK_MIME_TYPE)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanShareResult {
    pub value: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareFileOptions {
    /// The absolute path to the file.
    pub path: PathBuf,
    pub subdirectory: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareFilesOptions {
    pub paths: Vec<PathBuf>,
    /// MIME type announced for the whole batch, e.g. `image/*`.
    pub mime_type: String,
    pub subdirectory: Option<String>,
}
