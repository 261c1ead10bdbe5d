use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn log(&self) {
        match self.level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{}: {}", self.title, self.message),
            NoticeLevel::Warning => warn!("{}: {}", self.title, self.message),
            NoticeLevel::Error => error!("{}: {}", self.title, self.message),
        }
    }
}
