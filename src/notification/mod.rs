//! Notification types and the surface the pipeline reports through.
//!
//! The pipeline never talks to a UI toolkit, an OS notification API, a log
//! backend or a router directly. It emits the values defined here through a
//! [`NotificationSurface`] injected by the host application.

mod console;
pub mod dispatcher;
mod recording;
mod renderer;

pub use console::ConsoleSurface;
pub use dispatcher::{Dispatch, NotificationDispatcher};
pub use recording::RecordingSurface;
pub use renderer::NotificationRenderer;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ToastVariant;

/// A transient in-app message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
}

/// An OS-level notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotification {
    pub title: String,
    pub body: String,
}

/// Answer to a notification permission request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

/// Severity of a structured log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A collaborator failed; the pipeline carried on without it.
    Warn,
    Error,
}

/// A structured log entry handed to the host's log sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub key_values: BTreeMap<String, String>,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            key_values: BTreeMap::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, message)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key_values.insert(key.into(), value.into());
        self
    }
}

/// A route the host application should move to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl NavigationTarget {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

/// One side effect performed through a surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Toast(Toast),
    PermissionRequest(Permission),
    System(SystemNotification),
    Log(LogRecord),
    Navigation(NavigationTarget),
}

impl Notification {
    /// Returns true if the user can see this side effect.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::Toast(_) | Self::System(_) | Self::Navigation(_) | Self::PermissionRequest(_)
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toast(toast) => {
                write!(f, "[{}] {}: {}", toast.variant, toast.title, toast.description)
            }
            Self::PermissionRequest(answer) => write!(f, "Permission requested: {:?}", answer),
            Self::System(n) => write!(f, "{}: {}", n.title, n.body),
            Self::Log(record) => write!(f, "{:?}: {}", record.severity, record.message),
            Self::Navigation(target) => write!(f, "Navigate to {}", target),
        }
    }
}

/// Failure reported by a collaborator behind a [`NotificationSurface`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Notification permission check failed: {0}")]
    Permission(String),
    #[error("Failed to send system notification: {0}")]
    Send(String),
    #[error("Log sink failed: {0}")]
    Log(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
}

/// The host collaborators the pipeline reports through.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Fire-and-forget in-app toast.
    fn show_toast(&self, toast: Toast);

    async fn is_permission_granted(&self) -> Result<bool, SurfaceError>;

    async fn request_permission(&self) -> Result<Permission, SurfaceError>;

    async fn send_notification(&self, notification: SystemNotification)
        -> Result<(), SurfaceError>;

    async fn log(&self, record: LogRecord) -> Result<(), SurfaceError>;

    async fn navigate(&self, target: NavigationTarget) -> Result<(), SurfaceError>;

    /// The route the user is currently on, if the host tracks one.
    fn current_route(&self) -> Option<String>;
}
