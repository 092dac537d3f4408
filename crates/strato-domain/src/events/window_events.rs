use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::{ViewModelId, WindowKind};

/// Event fired when a window should be opened by whoever manages windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWindowEvent {
    pub window_kind: WindowKind,
    pub show_as_dialog: bool,
    pub occurred_at: DateTime<Utc>,
}

impl OpenWindowEvent {
    pub fn new(window_kind: WindowKind) -> Self {
        Self {
            window_kind,
            show_as_dialog: false,
            occurred_at: Utc::now(),
        }
    }

    /// Request the window modally
    pub fn dialog(window_kind: WindowKind) -> Self {
        Self {
            show_as_dialog: true,
            ..Self::new(window_kind)
        }
    }
}

crate::impl_event!(OpenWindowEvent);

/// Event fired when a view-model asks for its window, or all windows, to close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRequested {
    /// `None` means every window
    pub source: Option<ViewModelId>,
    pub occurred_at: DateTime<Utc>,
}

impl CloseRequested {
    pub fn all() -> Self {
        Self {
            source: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn from_view_model(source: ViewModelId) -> Self {
        Self {
            source: Some(source),
            occurred_at: Utc::now(),
        }
    }
}

crate::impl_event!(CloseRequested);
