use std::path::PathBuf;

use log::warn;
use tauri::{Runtime, Window};

use crate::Error;

pub fn can_share() -> bool {
    false
}

// There is no system share sheet on Linux desktops.
pub fn share_files<R: Runtime>(
    _window: &Window<R>,
    files: &[PathBuf],
    mime_type: &str,
    _title: Option<&str>,
) -> Result<(), Error> {
    warn!(
        "No share surface available, {} file(s) of type {} not handed off",
        files.len(),
        mime_type
    );
    Ok(())
}
