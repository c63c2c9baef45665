use crate::remote::types::ProjectEvent;

/// How prominently a notice should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A short user-facing message derived from a live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Map bundle and commit lifecycle events to notices. Everything else is
/// silent.
pub fn notice_for(event: &ProjectEvent) -> Option<Notice> {
    let notice = match event.kind.as_str() {
        "bundle.started" => Notice::new(NoticeLevel::Info, "Bundle started"),
        "bundle.completed" => Notice::new(NoticeLevel::Success, "Bundle completed"),
        "commit.started" => Notice::new(NoticeLevel::Info, "Commit started"),
        "commit.completed" => Notice::new(NoticeLevel::Success, "Commit completed"),
        "commit.failed" => {
            let code = event.payload_str("code").unwrap_or("error");
            Notice::new(NoticeLevel::Error, format!("Commit failed: {}", code))
        }
        _ => return None,
    };
    Some(notice)
}
