use std::io::Write;
use std::path::Path;

use crate::models::{EntryId, Filter, MediaCollection, MediaEntry, NewEntry};
use crate::{Error, Result};

mod directory;
#[cfg(test)]
pub(crate) mod memory;

pub use self::directory::FsMediaIndex;

/// The platform's shared media index.
///
/// Implementations own every record; callers only read, append, toggle the
/// pending flag and delete what they created. Queries must not return
/// pending entries.
pub trait MediaIndex: Send + Sync {
    /// Visible entries of `collection` matching `filter`, in index order.
    fn query(&self, collection: MediaCollection, filter: &Filter) -> Result<Vec<MediaEntry>>;

    /// Creates an empty entry and returns its identifier.
    fn insert(&self, collection: MediaCollection, entry: &NewEntry) -> Result<EntryId>;

    /// Opens a stream that replaces the entry's content. Dropping the
    /// writer closes it.
    fn open_writer(&self, id: &EntryId) -> Result<Box<dyn Write + Send>>;

    fn set_pending(&self, id: &EntryId, pending: bool) -> Result<()>;

    fn delete(&self, id: &EntryId) -> Result<()>;

    /// Identifier that grants access to a file outside the index.
    fn file_reference(&self, path: &Path) -> Result<EntryId> {
        url::Url::from_file_path(path)
            .map(|url| EntryId(url.to_string()))
            .map_err(|_| {
                Error::InvalidArgs(format!("{} is not an absolute path", path.display()))
            })
    }
}
