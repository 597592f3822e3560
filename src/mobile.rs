use std::io::{self, Write};
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use log::info;
use serde::{Deserialize, Serialize};
use tauri::{
    plugin::{PluginApi, PluginHandle},
    AppHandle, Runtime, Window,
};

use crate::index::MediaIndex;
use crate::models::{CanShareResult, Config, EntryId, Filter, MediaCollection, MediaEntry, NewEntry};
use crate::resolver::UriResolver;
use crate::share::{self, ShareInvoker, ShareRequest};
use crate::storage::StorageMode;
use crate::Result;

#[cfg(target_os = "android")]
const PLUGIN_IDENTIFIER: &str = "plugin.vnidrop.mediashare";

#[cfg(target_os = "ios")]
tauri::ios_plugin_binding!(init_plugin_media_share);

/// Bytes buffered by a writer before they cross the bridge.
const WRITE_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Capabilities {
    scoped_storage: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryArgs<'a> {
    collection: MediaCollection,
    filter: &'a Filter,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertArgs<'a> {
    collection: MediaCollection,
    entry: &'a NewEntry,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdArgs<'a> {
    id: &'a EntryId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingArgs<'a> {
    id: &'a EntryId,
    pending: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteChunkArgs<'a> {
    id: &'a EntryId,
    /// Base64 encoded bytes.
    data: String,
    append: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PathArgs<'a> {
    path: &'a Path,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdResponse {
    id: EntryId,
}

// initializes the Kotlin or Swift plugin classes
pub fn init<R: Runtime>(
    _app: &AppHandle<R>,
    api: PluginApi<R, Option<Config>>,
) -> Result<MediaShare<R>> {
    let config = api.config().clone().unwrap_or_default();
    #[cfg(target_os = "android")]
    let handle = api.register_android_plugin(PLUGIN_IDENTIFIER, "MediaSharePlugin")?;
    #[cfg(target_os = "ios")]
    let handle = api.register_ios_plugin(init_plugin_media_share)?;

    let capabilities: Capabilities = handle.run_mobile_plugin("capabilities", ())?;
    let mode = StorageMode::from_capability(capabilities.scoped_storage);
    info!("Native media index ready ({:?})", mode);

    let index = PluginMediaIndex {
        handle: handle.clone(),
    };
    Ok(MediaShare {
        handle,
        resolver: UriResolver::new(index, mode)
            .with_default_subdirectory(config.default_subdirectory),
        chooser_title: config.chooser_title,
    })
}

/// Access to the media share APIs.
pub struct MediaShare<R: Runtime> {
    handle: PluginHandle<R>,
    resolver: UriResolver<PluginMediaIndex<R>>,
    chooser_title: Option<String>,
}

impl<R: Runtime> MediaShare<R> {
    pub fn resolver(&self) -> &UriResolver<PluginMediaIndex<R>> {
        &self.resolver
    }

    pub fn share_one(&self, _window: Window<R>, target: EntryId, mime_type: String) -> Result<()> {
        share::share_one(&self.invoker(), target, mime_type, self.chooser_title.as_deref())
    }

    pub fn share_many(&self, _window: Window<R>, targets: Vec<EntryId>, mime_type: String) -> Result<()> {
        share::share_many(&self.invoker(), targets, mime_type, self.chooser_title.as_deref())
    }

    pub fn can_share(&self) -> CanShareResult {
        CanShareResult { value: true }
    }

    fn invoker(&self) -> NativeInvoker<'_, R> {
        NativeInvoker {
            handle: &self.handle,
        }
    }
}

struct NativeInvoker<'a, R: Runtime> {
    handle: &'a PluginHandle<R>,
}

impl<R: Runtime> ShareInvoker for NativeInvoker<'_, R> {
    fn present(&self, request: &ShareRequest) -> Result<()> {
        self.handle
            .run_mobile_plugin("share", request)
            .map_err(Into::into)
    }
}

/// The native media index (`MediaStore` on Android), reached through the
/// plugin bridge.
pub struct PluginMediaIndex<R: Runtime> {
    handle: PluginHandle<R>,
}

impl<R: Runtime> MediaIndex for PluginMediaIndex<R> {
    fn query(&self, collection: MediaCollection, filter: &Filter) -> Result<Vec<MediaEntry>> {
        self.handle
            .run_mobile_plugin("query", QueryArgs { collection, filter })
            .map_err(Into::into)
    }

    fn insert(&self, collection: MediaCollection, entry: &NewEntry) -> Result<EntryId> {
        let response: IdResponse = self
            .handle
            .run_mobile_plugin("insert", InsertArgs { collection, entry })?;
        Ok(response.id)
    }

    fn open_writer(&self, id: &EntryId) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(ChunkWriter {
            handle: self.handle.clone(),
            id: id.clone(),
            buffer: Vec::with_capacity(WRITE_CHUNK_SIZE),
            started: false,
        }))
    }

    fn set_pending(&self, id: &EntryId, pending: bool) -> Result<()> {
        self.handle
            .run_mobile_plugin("setPending", PendingArgs { id, pending })
            .map_err(Into::into)
    }

    fn delete(&self, id: &EntryId) -> Result<()> {
        self.handle
            .run_mobile_plugin("delete", IdArgs { id })
            .map_err(Into::into)
    }

    fn file_reference(&self, path: &Path) -> Result<EntryId> {
        let response: IdResponse = self
            .handle
            .run_mobile_plugin("fileProviderUri", PathArgs { path })?;
        Ok(response.id)
    }
}

/// Streams an entry's content to the native side in Base64 chunks. The first
/// chunk truncates, later ones append.
struct ChunkWriter<R: Runtime> {
    handle: PluginHandle<R>,
    id: EntryId,
    buffer: Vec<u8>,
    started: bool,
}

impl<R: Runtime> ChunkWriter<R> {
    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() && self.started {
            return Ok(());
        }
        let args = WriteChunkArgs {
            id: &self.id,
            data: general_purpose::STANDARD.encode(&self.buffer),
            append: self.started,
        };
        self.handle
            .run_mobile_plugin::<()>("writeChunk", args)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.buffer.clear();
        self.started = true;
        Ok(())
    }
}

impl<R: Runtime> Write for ChunkWriter<R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= WRITE_CHUNK_SIZE {
            self.send_buffer()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer()
    }
}
