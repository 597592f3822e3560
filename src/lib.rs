//! # tauri-plugin-media-share
//!
//! A Tauri plugin that publishes local files into shared media storage and hands them to the
//! native share sheet on Android, iOS, macOS and Windows.
//!
//! Sharing a private file takes two steps. The plugin first looks for an existing entry in the
//! platform media index (`MediaStore` on Android, a directory tree with a JSON manifest on
//! desktop). If there is none it copies the file into the shared collection matching its MIME
//! type: images, video, audio, or generic files. The copy stays hidden until every byte is
//! written and is removed again if anything fails. A file already shared under the same name
//! and size is reused instead of copied again.
//!
//! ## Usage
//!
//! ### Rust
//!
//! ```rust,ignore
//! // src/main.rs
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(tauri_plugin_media_share::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! The plugin is configured under `plugins.media-share` in `tauri.conf.json`:
//!
//! ```json
//! {
//!   "plugins": {
//!     "media-share": {
//!       "defaultSubdirectory": "Mask",
//!       "chooserTitle": "Share file"
//!     }
//!   }
//! }
//! ```
//!
//! ### Frontend (JavaScript/TypeScript)
//!
//! ```js
//! import { invoke } from '@tauri-apps/api/core';
//!
//! // Copy (or reuse) the file and open the share sheet.
//! const id = await invoke('plugin:media-share|share_file', {
//!   options: { path: '/data/user/0/app/files/report.pdf' },
//! });
//!
//! // Share several files that are already resolved.
//! await invoke('plugin:media-share|share_many', { ids: [id], mimeType: 'application/pdf' });
//! ```
//!

use tauri::{
    plugin::{Builder, TauriPlugin},
    Manager, Runtime,
};

pub use models::*;

#[cfg(desktop)]
mod desktop;
#[cfg(mobile)]
mod mobile;
#[cfg(desktop)]
mod platform;

mod commands;
mod error;
mod index;
mod models;
mod resolver;
mod share;
mod storage;

pub use error::{Error, Result};
pub use index::{FsMediaIndex, MediaIndex};
pub use resolver::{classify, UriResolver};
pub use share::{
    share_many, share_one, ShareAction, ShareInvoker, ShareRequest, FLAG_GRANT_READ,
    FLAG_GRANT_WRITE, FLAG_NEW_TASK,
};
pub use storage::StorageMode;

#[cfg(desktop)]
pub use desktop::MediaShare;
#[cfg(mobile)]
pub use mobile::{MediaShare, PluginMediaIndex};

/// Extensions to [`tauri::App`], [`tauri::AppHandle`] and [`tauri::Window`] to access the media share APIs.
pub trait MediaShareExt<R: Runtime> {
    fn media_share(&self) -> &MediaShare<R>;
}

impl<R: Runtime, T: Manager<R>> crate::MediaShareExt<R> for T {
    fn media_share(&self) -> &MediaShare<R> {
        self.state::<MediaShare<R>>().inner()
    }
}

/// Initializes the plugin.
///
/// Reads the plugin configuration, detects whether shared storage is scoped and opens the
/// media index for the current platform.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<Config>> {
    Builder::<R, Option<Config>>::new("media-share")
        .invoke_handler(tauri::generate_handler![
            commands::resolve_existing_entry,
            commands::resolve_duplicate,
            commands::classify,
            commands::copy_into_shared_storage,
            commands::describe_entry,
            commands::share_one,
            commands::share_many,
            commands::share_file,
            commands::share_files,
            commands::can_share,
        ])
        .setup(|app, api| {
            #[cfg(mobile)]
            let media_share = mobile::init(app, api)?;
            #[cfg(desktop)]
            let media_share = desktop::init(app, api)?;
            app.manage(media_share);
            Ok(())
        })
        .build()
}
