use log::info;
use tauri::{plugin::PluginApi, AppHandle, Manager, Runtime, Window};

use crate::index::FsMediaIndex;
use crate::models::{CanShareResult, Config, EntryId};
use crate::platform;
use crate::resolver::UriResolver;
use crate::share::{self, ShareInvoker, ShareRequest};
use crate::storage::StorageMode;
use crate::Result;

const INDEX_FILE_NAME: &str = "media-index.json";

pub fn init<R: Runtime>(
    app: &AppHandle<R>,
    api: PluginApi<R, Option<Config>>,
) -> Result<MediaShare<R>> {
    let config = api.config().clone().unwrap_or_default();
    let root = match config.shared_root {
        Some(root) => root,
        None => app.path().home_dir()?,
    };
    let index_file = match config.index_file {
        Some(file) => file,
        None => app.path().app_data_dir()?.join(INDEX_FILE_NAME),
    };
    let mode = StorageMode::from_capability(config.scoped_storage.unwrap_or(true));
    info!(
        "Shared storage at {} ({:?}), index at {}",
        root.display(),
        mode,
        index_file.display()
    );

    let index = FsMediaIndex::open(root, index_file)?;
    Ok(MediaShare {
        resolver: UriResolver::new(index, mode)
            .with_default_subdirectory(config.default_subdirectory),
        chooser_title: config.chooser_title,
        _app: app.clone(),
    })
}

/// Access to the media share APIs.
pub struct MediaShare<R: Runtime> {
    resolver: UriResolver<FsMediaIndex>,
    chooser_title: Option<String>,
    _app: AppHandle<R>,
}

impl<R: Runtime> MediaShare<R> {
    pub fn resolver(&self) -> &UriResolver<FsMediaIndex> {
        &self.resolver
    }

    pub fn share_one(&self, window: Window<R>, target: EntryId, mime_type: String) -> Result<()> {
        share::share_one(&self.invoker(window), target, mime_type, self.chooser_title.as_deref())
    }

    pub fn share_many(&self, window: Window<R>, targets: Vec<EntryId>, mime_type: String) -> Result<()> {
        share::share_many(&self.invoker(window), targets, mime_type, self.chooser_title.as_deref())
    }

    pub fn can_share(&self) -> CanShareResult {
        CanShareResult {
            value: platform::can_share(),
        }
    }

    fn invoker(&self, window: Window<R>) -> WindowInvoker<'_, R> {
        WindowInvoker {
            window,
            index: self.resolver.index(),
        }
    }
}

/// Presents share requests from a window, sharing the files behind each
/// identifier.
struct WindowInvoker<'a, R: Runtime> {
    window: Window<R>,
    index: &'a FsMediaIndex,
}

impl<R: Runtime> ShareInvoker for WindowInvoker<'_, R> {
    fn present(&self, request: &ShareRequest) -> Result<()> {
        let files = request
            .targets
            .iter()
            .map(|target| self.index.file_for(target))
            .collect::<Result<Vec<_>>>()?;
        platform::share_files(
            &self.window,
            &files,
            &request.mime_type,
            request.chooser_title.as_deref(),
        )
    }
}
