use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use log::warn;
use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use tauri::{Runtime, Window};
use windows::ApplicationModel::DataTransfer::{DataRequestedEventArgs, DataTransferManager};
use windows::Storage::IStorageItem;
use windows::{
    core::{Interface, HSTRING},
    Foundation::TypedEventHandler,
    Storage::StorageFile,
    Win32::{
        Foundation::HWND,
        System::WinRT::{RoInitialize, RO_INIT_SINGLETHREADED},
        UI::Shell::IDataTransferManagerInterop,
    },
};
use windows_collections::IIterable;

use crate::Error;

const DEFAULT_TITLE: &str = "Share";

// Keeps the DataTransferManager and its event registration alive until the
// share UI has asked for its data. Only touched on the main thread.
thread_local! {
    static SHARE_STATE: RefCell<Option<(DataTransferManager, i64)>> = RefCell::new(None);
}

impl From<windows::core::Error> for Error {
    fn from(err: windows::core::Error) -> Self {
        Error::NativeApi(err.message().to_string())
    }
}

pub fn can_share() -> bool {
    true
}

pub fn share_files<R: Runtime>(
    window: &Window<R>,
    files: &[PathBuf],
    _mime_type: &str,
    title: Option<&str>,
) -> Result<(), Error> {
    let (tx, rx) = mpsc::channel();
    let win_clone = window.clone();
    let files: Arc<Vec<PathBuf>> = Arc::new(files.to_vec());
    // The share UI refuses a data package without a title.
    let title = title.unwrap_or(DEFAULT_TITLE).to_string();

    window.run_on_main_thread(move || {
        let result = (|| -> Result<(), Error> {
            initialize_winrt_thread()?;
            let hwnd = get_hwnd(&win_clone)?;
            let (dtm, interop) = get_data_transfer_manager(hwnd)?;

            let data_requested_handler = TypedEventHandler::new({
                let files = files.clone();
                move |_, args: windows::core::Ref<'_, DataRequestedEventArgs>| -> windows::core::Result<()> {
                    if let Some(request_args) = (*args).as_ref() {
                        let request = request_args.Request()?;
                        let data = request.Data()?;
                        data.Properties()?.SetTitle(&HSTRING::from(title.as_str()))?;

                        let deferral = request.GetDeferral()?;
                        let data_clone = data.clone();
                        let files = files.clone();
                        tauri::async_runtime::spawn(async move {
                            let storage_items: Vec<Option<IStorageItem>> = files
                                .iter()
                                .filter_map(|path| match storage_item(path) {
                                    Ok(item) => Some(Some(item)),
                                    Err(e) => {
                                        warn!("Skipping {}: {}", path.display(), e);
                                        None
                                    }
                                })
                                .collect();

                            let items: IIterable<IStorageItem> = storage_items.into();
                            if let Err(e) = data_clone.SetStorageItemsReadOnly(&items) {
                                warn!("Failed to set storage items on data package: {}", e);
                            }
                            deferral.Complete()?;
                            Ok::<(), windows::core::Error>(())
                        });
                    }

                    SHARE_STATE.with(|state| {
                        if let Some((manager, token)) = state.borrow_mut().take() {
                            let _ = manager.RemoveDataRequested(token);
                        }
                    });
                    Ok(())
                }
            });

            let token = dtm.DataRequested(&data_requested_handler)?;

            SHARE_STATE.with(|state| {
                *state.borrow_mut() = Some((dtm, token));
            });

            unsafe { interop.ShowShareUIForWindow(hwnd) }?;
            Ok(())
        })();
        tx.send(result).ok();
    })?;

    rx.recv()
        .map_err(|_| Error::NativeApi("Failed to receive result from main thread".to_string()))?
}

fn storage_item(path: &Path) -> windows::core::Result<IStorageItem> {
    let path = HSTRING::from(path.as_os_str());
    StorageFile::GetFileFromPathAsync(&path)?.get()?.cast()
}

/// Initializes the Windows Runtime on the current thread.
fn initialize_winrt_thread() -> Result<(), Error> {
    // S_FALSE when the thread is already initialized, which is fine.
    unsafe { RoInitialize(RO_INIT_SINGLETHREADED) }
        .map_err(|e| Error::NativeApi(format!("Failed to initialize WinRT: {}", e)))
}

/// Retrieves the native window handle (HWND) from the Tauri window.
fn get_hwnd<R: Runtime>(window: &Window<R>) -> Result<HWND, Error> {
    let handle = window
        .window_handle()
        .map_err(|e| Error::NativeApi(e.to_string()))?;

    match handle.as_raw() {
        RawWindowHandle::Win32(handle) => Ok(HWND(handle.hwnd.get() as *mut std::ffi::c_void)),
        _ => Err(Error::NativeApi(
            "Unsupported window handle type".to_string(),
        )),
    }
}

/// Gets the DataTransferManager associated with the window's HWND, as
/// desktop (non-UWP) applications must.
fn get_data_transfer_manager(hwnd: HWND) -> Result<(DataTransferManager, IDataTransferManagerInterop), Error> {
    let interop =
        windows::core::factory::<DataTransferManager, IDataTransferManagerInterop>()?;
    let dtm = unsafe { interop.GetForWindow(hwnd) }?;
    Ok((dtm, interop))
}
