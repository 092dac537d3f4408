use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn from_string(s: &str) -> Self {
                Self(s.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Named kinds are caller-chosen identifiers that must not be blank.
macro_rules! define_kind {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
                let name = name.into();
                if name.trim().is_empty() {
                    return Err(DomainError::InvalidArgument(format!(
                        "{} name cannot be empty",
                        $label
                    )));
                }
                Ok(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(WindowId);
define_id!(ViewModelId);

define_kind!(WindowKind, "Window kind");
define_kind!(ViewKind, "View kind");

/// Error codes for structured error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Arguments (1xxx)
    InvalidArgument = 1001,
    EventTypeMismatch = 1002,

    // Registration (2xxx)
    NotRegistered = 2001,

    // Dispatch (3xxx)
    HandlerFault = 3001,
    HandlersFailed = 3002,
    HandlerTimedOut = 3003,

    // Collaborators (4xxx)
    NavigationFailed = 4001,
    WindowFailed = 4002,
    CommandFailed = 4003,

    // Infrastructure (5xxx)
    InfrastructureError = 5001,
}

impl ErrorCode {
    /// Get error code as integer
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorCode::InvalidArgument | ErrorCode::NotRegistered => ErrorSeverity::Info,

            ErrorCode::HandlerFault
            | ErrorCode::HandlerTimedOut
            | ErrorCode::NavigationFailed
            | ErrorCode::WindowFailed
            | ErrorCode::CommandFailed => ErrorSeverity::Warning,

            ErrorCode::EventTypeMismatch | ErrorCode::HandlersFailed => ErrorSeverity::Error,

            ErrorCode::InfrastructureError => ErrorSeverity::Critical,
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorCode::HandlerTimedOut | ErrorCode::HandlerFault)
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Event type mismatch: handler for {expected} received {actual}")]
    EventTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Not registered: {0}")]
    NotRegistered(String),

    #[error("Handler fault: {0}")]
    HandlerFault(String),

    #[error("{} of {total} handlers failed for {event_type}", .failures.len())]
    HandlersFailed {
        event_type: &'static str,
        total: usize,
        failures: Vec<DomainError>,
    },

    #[error("Handler for {event_type} timed out after {timeout_ms}ms")]
    HandlerTimedOut {
        event_type: &'static str,
        timeout_ms: u128,
    },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Get error code
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            DomainError::EventTypeMismatch { .. } => ErrorCode::EventTypeMismatch,
            DomainError::NotRegistered(_) => ErrorCode::NotRegistered,
            DomainError::HandlerFault(_) => ErrorCode::HandlerFault,
            DomainError::HandlersFailed { .. } => ErrorCode::HandlersFailed,
            DomainError::HandlerTimedOut { .. } => ErrorCode::HandlerTimedOut,
            DomainError::Navigation(_) => ErrorCode::NavigationFailed,
            DomainError::Window(_) => ErrorCode::WindowFailed,
            DomainError::Command(_) => ErrorCode::CommandFailed,
            DomainError::Infrastructure(_) => ErrorCode::InfrastructureError,
        }
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        self.code().severity()
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        self.code().is_recoverable()
    }

    /// Format error with code
    pub fn format_with_code(&self) -> String {
        format!("[{}] {}", self.code().code(), self)
    }

    /// Individual failures behind an aggregated dispatch error.
    ///
    /// Any other error is returned as a single-element slice.
    pub fn failures(&self) -> &[DomainError] {
        match self {
            DomainError::HandlersFailed { failures, .. } => failures,
            other => std::slice::from_ref(other),
        }
    }
}
