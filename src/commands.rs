use std::path::PathBuf;

use tauri::{command, AppHandle, Runtime, Window};

use crate::models::{
    CanShareResult, Classification, EntryId, LocalFile, MediaEntry, ShareFileOptions,
    ShareFilesOptions,
};
use crate::{error::Result, resolver, MediaShare, MediaShareExt};

// Media queries and byte copies block, so they run on the blocking pool
// instead of the IPC thread.
async fn run_blocking<R, T, F>(app: AppHandle<R>, f: F) -> Result<T>
where
    R: Runtime,
    T: Send + 'static,
    F: FnOnce(&MediaShare<R>) -> Result<T> + Send + 'static,
{
    tauri::async_runtime::spawn_blocking(move || f(app.media_share())).await?
}

#[command]
pub async fn resolve_existing_entry<R: Runtime>(
    app: AppHandle<R>,
    path: PathBuf,
) -> Result<Option<EntryId>> {
    run_blocking(app, move |share| {
        Ok(share.resolver().resolve_existing_entry(&path))
    })
    .await
}

#[command]
pub async fn resolve_duplicate<R: Runtime>(
    app: AppHandle<R>,
    name: String,
    size: u64,
) -> Result<Option<EntryId>> {
    run_blocking(app, move |share| {
        Ok(share.resolver().resolve_duplicate(&name, size))
    })
    .await
}

#[command]
pub async fn classify(mime_type: String) -> Result<Classification> {
    Ok(resolver::classify(&mime_type))
}

#[command]
pub async fn copy_into_shared_storage<R: Runtime>(
    app: AppHandle<R>,
    path: PathBuf,
    subdirectory: Option<String>,
) -> Result<EntryId> {
    run_blocking(app, move |share| {
        let local = LocalFile::open(&path)?;
        share
            .resolver()
            .copy_into_shared_storage(&local, subdirectory.as_deref())
    })
    .await
}

#[command]
pub async fn describe_entry<R: Runtime>(
    app: AppHandle<R>,
    id: EntryId,
) -> Result<Option<MediaEntry>> {
    run_blocking(app, move |share| Ok(share.resolver().describe(&id))).await
}

#[command]
pub async fn share_one<R: Runtime>(
    app: AppHandle<R>,
    window: Window<R>,
    id: EntryId,
    mime_type: String,
) -> Result<()> {
    run_blocking(app, move |share| share.share_one(window, id, mime_type)).await
}

#[command]
pub async fn share_many<R: Runtime>(
    app: AppHandle<R>,
    window: Window<R>,
    ids: Vec<EntryId>,
    mime_type: String,
) -> Result<()> {
    run_blocking(app, move |share| share.share_many(window, ids, mime_type)).await
}

/// Resolves or copies one file, then shares it with its own MIME type.
#[command]
pub async fn share_file<R: Runtime>(
    app: AppHandle<R>,
    window: Window<R>,
    options: ShareFileOptions,
) -> Result<EntryId> {
    run_blocking(app, move |share| {
        let local = LocalFile::open(&options.path)?;
        let id = share
            .resolver()
            .resolve_for_sharing(&local.path, options.subdirectory.as_deref())?;
        share.share_one(window, id.clone(), local.mime_type)?;
        Ok(id)
    })
    .await
}

/// Resolves or copies every file, then shares them as one batch.
#[command]
pub async fn share_files<R: Runtime>(
    app: AppHandle<R>,
    window: Window<R>,
    options: ShareFilesOptions,
) -> Result<Vec<EntryId>> {
    run_blocking(app, move |share| {
        let ids = options
            .paths
            .iter()
            .map(|path| {
                share
                    .resolver()
                    .resolve_for_sharing(path, options.subdirectory.as_deref())
            })
            .collect::<Result<Vec<_>>>()?;
        share.share_many(window, ids.clone(), options.mime_type)?;
        Ok(ids)
    })
    .await
}

#[command]
pub async fn can_share<R: Runtime>(app: AppHandle<R>) -> Result<CanShareResult> {
    Ok(app.media_share().can_share())
}
