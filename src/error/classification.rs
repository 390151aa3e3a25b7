//! Status code classification for application errors.
//!
//! Status codes follow HTTP conventions but nothing enforces them: the class
//! only picks toast styling and a human label. Whether an error is fatal is
//! always the caller's decision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The broad class of a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    /// Anything below 400.
    Informational,
    /// 401 and 403.
    Unauthorized,
    /// 404.
    NotFound,
    /// 408, typically exhausted polling.
    Timeout,
    /// Remaining 4xx validation and client errors.
    ClientError,
    /// 500 and above.
    ServerError,
}

impl StatusClass {
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            408 => Self::Timeout,
            400..=499 => Self::ClientError,
            500..=u16::MAX => Self::ServerError,
            _ => Self::Informational,
        }
    }

    /// The toast styling for errors of this class.
    pub fn toast_variant(&self) -> ToastVariant {
        match self {
            Self::Unauthorized => ToastVariant::Unauthorized,
            Self::NotFound | Self::Timeout | Self::ClientError => ToastVariant::Warning,
            Self::ServerError => ToastVariant::Destructive,
            Self::Informational => ToastVariant::Info,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Informational => write!(f, "informational"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not found"),
            Self::Timeout => write!(f, "timeout"),
            Self::ClientError => write!(f, "client error"),
            Self::ServerError => write!(f, "server error"),
        }
    }
}

/// Visual style of a toast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Destructive,
    Warning,
    Info,
    Unauthorized,
}

impl ToastVariant {
    pub fn for_status(status_code: u16) -> Self {
        StatusClass::from_status(status_code).toast_variant()
    }
}

impl fmt::Display for ToastVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destructive => write!(f, "destructive"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}
