use log::info;
use serde::{Deserialize, Serialize};

use crate::models::EntryId;
use crate::Result;

/// Lets the receiving application read the shared identifiers.
pub const FLAG_GRANT_READ: u32 = 0x0000_0001;
/// Lets the receiving application write to the shared identifiers.
pub const FLAG_GRANT_WRITE: u32 = 0x0000_0002;
/// Starts the chooser in a task of its own.
pub const FLAG_NEW_TASK: u32 = 0x1000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShareAction {
    Send,
    SendMultiple,
}

/// A one-shot request for the platform chooser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub action: ShareAction,
    pub targets: Vec<EntryId>,
    /// Applies to every target.
    pub mime_type: String,
    pub flags: u32,
    /// Heading of the chooser. Platforms without one ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chooser_title: Option<String>,
}

impl ShareRequest {
    pub fn single(target: EntryId, mime_type: impl Into<String>) -> Self {
        ShareRequest {
            action: ShareAction::Send,
            targets: vec![target],
            mime_type: mime_type.into(),
            flags: FLAG_NEW_TASK | FLAG_GRANT_READ | FLAG_GRANT_WRITE,
            chooser_title: None,
        }
    }

    pub fn multiple(targets: Vec<EntryId>, mime_type: impl Into<String>) -> Self {
        ShareRequest {
            action: ShareAction::SendMultiple,
            targets,
            mime_type: mime_type.into(),
            flags: FLAG_NEW_TASK | FLAG_GRANT_READ | FLAG_GRANT_WRITE,
            chooser_title: None,
        }
    }

    pub fn with_chooser_title(mut self, title: Option<&str>) -> Self {
        self.chooser_title = title.map(str::to_string);
        self
    }

    pub fn grants(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }
}

/// The platform's share surface.
pub trait ShareInvoker {
    /// Hands the request to the platform chooser. Whatever the platform does
    /// when nothing can receive it is its own business.
    fn present(&self, request: &ShareRequest) -> Result<()>;
}

pub fn share_one<S: ShareInvoker + ?Sized>(
    invoker: &S,
    target: EntryId,
    mime_type: impl Into<String>,
    chooser_title: Option<&str>,
) -> Result<()> {
    let request = ShareRequest::single(target, mime_type).with_chooser_title(chooser_title);
    info!("Sharing {} as {}", request.targets[0], request.mime_type);
    invoker.present(&request)
}

pub fn share_many<S: ShareInvoker + ?Sized>(
    invoker: &S,
    targets: Vec<EntryId>,
    mime_type: impl Into<String>,
    chooser_title: Option<&str>,
) -> Result<()> {
    let request = ShareRequest::multiple(targets, mime_type).with_chooser_title(chooser_title);
    info!("Sharing {} files as {}", request.targets.len(), request.mime_type);
    invoker.present(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        presented: Mutex<Vec<ShareRequest>>,
    }

    impl ShareInvoker for Recorder {
        fn present(&self, request: &ShareRequest) -> Result<()> {
            self.presented.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    #[test]
    fn single_share_grants_read_and_write() {
        let recorder = Recorder::default();
        let id = EntryId::from("content://media/external/file/7");
        share_one(&recorder, id.clone(), "application/pdf", None).unwrap();

        let presented = recorder.presented.lock().unwrap();
        assert_eq!(presented.len(), 1);
        let request = &presented[0];
        assert_eq!(request.action, ShareAction::Send);
        assert_eq!(request.targets, vec![id]);
        assert_eq!(request.mime_type, "application/pdf");
        assert!(request.grants(FLAG_GRANT_READ | FLAG_GRANT_WRITE));
        assert!(request.grants(FLAG_NEW_TASK));
        assert_eq!(request.chooser_title, None);
    }

    #[test]
    fn multiple_share_uses_one_mime_type() {
        let recorder = Recorder::default();
        let ids: Vec<EntryId> = (1..=3)
            .map(|n| EntryId(format!("content://media/external/images/media/{}", n)))
            .collect();
        share_many(&recorder, ids.clone(), "image/*", Some("Send photos")).unwrap();

        let presented = recorder.presented.lock().unwrap();
        assert_eq!(presented[0].action, ShareAction::SendMultiple);
        assert_eq!(presented[0].targets, ids);
        assert_eq!(presented[0].mime_type, "image/*");
        assert_eq!(presented[0].chooser_title.as_deref(), Some("Send photos"));
    }

    #[test]
    fn empty_batch_still_reaches_the_chooser() {
        let recorder = Recorder::default();
        share_many(&recorder, Vec::new(), "image/*", None).unwrap();

        let presented = recorder.presented.lock().unwrap();
        assert_eq!(presented.len(), 1);
        assert!(presented[0].targets.is_empty());
        assert!(presented[0].grants(FLAG_GRANT_READ));
    }

    #[test]
    fn request_serializes_for_native_side() {
        let request = ShareRequest::single(EntryId::from("content://media/external/file/1"), "text/plain");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["action"], "send");
        assert_eq!(json["targets"][0], "content://media/external/file/1");
        assert_eq!(json["mimeType"], "text/plain");
        assert_eq!(json["flags"], 0x1000_0003u32);
        assert!(json.get("chooserTitle").is_none());

        let titled = request.with_chooser_title(Some("Share file"));
        let json = serde_json::to_value(&titled).unwrap();
        assert_eq!(json["chooserTitle"], "Share file");
    }
}
