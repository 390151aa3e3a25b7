//! The structured application error and the options used to build it.
//!
//! An [`AppError`] is created where a failure is caught or raised on purpose
//! and is consumed by exactly one handler invocation. Its handled state only
//! moves forward, so passing the same error to the handler twice is a no-op.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Type name given to errors created through [`create_error`].
pub const APP_ERROR_NAME: &str = "AppError";

/// Status code used when the caller supplies none.
pub const DEFAULT_STATUS_CODE: u16 = 500;

/// Lifecycle of a single error instance inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorState {
    /// Freshly constructed or freshly caught.
    #[default]
    Unhandled,
    /// A handler invocation is currently dispatching this error.
    Handling,
    /// Terminal. No further handler may report this error.
    Handled,
}

/// How a group key is derived when the caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKeyStrategy {
    /// `{name}-{status_code}`
    #[default]
    TypeAndStatus,
    /// `{name}-{status_code}-{message digest}`
    TypeStatusAndMessage,
}

impl GroupKeyStrategy {
    /// Derives a group key for an error with the given name, status and message.
    pub fn derive(&self, name: &str, status_code: u16, message: &str) -> String {
        match self {
            Self::TypeAndStatus => format!("{}-{}", name, status_code),
            Self::TypeStatusAndMessage => {
                let digest = Sha256::digest(message.as_bytes());
                let short = hex::encode(&digest[..4]);
                format!("{}-{}-{}", name, status_code, short)
            }
        }
    }
}

/// Caller-supplied options for creating or handling an error.
///
/// Every field is optional; unset fields fall back to the defaults documented
/// on [`AppError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOptions {
    /// HTTP-like classification code.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Whether the error interrupts the user flow.
    #[serde(default)]
    pub fatal: Option<bool>,
    /// Arbitrary structured context.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    /// Log only, never show anything to the user.
    #[serde(default)]
    pub silent: bool,
    /// Explicit deduplication bucket.
    #[serde(default)]
    pub group_key: Option<String>,
}

impl ErrorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = Some(fatal);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn group_key(mut self, group_key: impl Into<String>) -> Self {
        self.group_key = Some(group_key.into());
        self
    }

    /// Replaces the context data wholesale.
    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Adds a single context entry, creating the data map if needed.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// A structured error carrying status, fatality, context and handled state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    pub message: String,
    pub status_code: u16,
    pub fatal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    pub name: String,
    pub group_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    state: ErrorState,
}

impl AppError {
    /// Builds an error named [`APP_ERROR_NAME`] with the default group key strategy.
    pub fn new(message: impl Into<String>, options: &ErrorOptions) -> Self {
        Self::build(
            message.into(),
            APP_ERROR_NAME.to_string(),
            None,
            options,
            GroupKeyStrategy::default(),
        )
    }

    pub(crate) fn build(
        message: String,
        name: String,
        stack: Option<String>,
        options: &ErrorOptions,
        strategy: GroupKeyStrategy,
    ) -> Self {
        let status_code = options.status_code.unwrap_or(DEFAULT_STATUS_CODE);
        let group_key = options
            .group_key
            .clone()
            .unwrap_or_else(|| strategy.derive(&name, status_code, &message));

        Self {
            message,
            status_code,
            fatal: options.fatal.unwrap_or(false),
            data: options.data.clone(),
            name,
            group_key,
            stack,
            state: ErrorState::Unhandled,
        }
    }

    /// Attaches the current backtrace if the runtime captured one.
    pub fn with_captured_stack(mut self) -> Self {
        self.stack = capture_stack();
        self
    }

    pub fn state(&self) -> ErrorState {
        self.state
    }

    pub fn is_handled(&self) -> bool {
        self.state == ErrorState::Handled
    }

    /// Moves `Unhandled` to `Handling`. Later states are left alone.
    pub(crate) fn begin_handling(&mut self) {
        if self.state == ErrorState::Unhandled {
            self.state = ErrorState::Handling;
        }
    }

    pub(crate) fn mark_handled(&mut self) {
        self.state = ErrorState::Handled;
    }

    /// Context data serialized as JSON, `{}` when there is none.
    pub fn data_json(&self) -> String {
        match &self.data {
            Some(data) => Value::Object(data.clone()).to_string(),
            None => "{}".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

/// Creates an [`AppError`] from a message and options.
///
/// ```
/// use cortex_errors::error::{create_error, ErrorOptions};
///
/// let options = ErrorOptions::new().status_code(404).with_data("slug", "x");
/// let err = create_error("not found", options);
/// assert_eq!(err.status_code, 404);
/// assert_eq!(err.group_key, "AppError-404");
/// ```
pub fn create_error(message: impl Into<String>, options: ErrorOptions) -> AppError {
    AppError::new(message, &options)
}

/// An error as it arrives at the handler boundary.
#[derive(Debug, Clone)]
pub enum RaisedError {
    /// Anything that is not already an [`AppError`].
    Native {
        message: String,
        type_name: String,
        stack: Option<String>,
    },
    Application(AppError),
}

impl RaisedError {
    /// Wraps any standard error, keeping its message and short type name.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::Native {
            message: err.to_string(),
            type_name: short_type_name::<E>(),
            stack: capture_stack(),
        }
    }

    /// A bare message with no underlying error type.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Native {
            message: message.into(),
            type_name: "Error".to_string(),
            stack: capture_stack(),
        }
    }

    /// Resolves the input into an [`AppError`], merging `options` into native errors.
    pub fn into_app_error(self, options: &ErrorOptions, strategy: GroupKeyStrategy) -> AppError {
        match self {
            Self::Application(err) => err,
            Self::Native {
                message,
                type_name,
                stack,
            } => AppError::build(message, type_name, stack, options, strategy),
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Application(err) if err.is_handled())
    }

    /// The human-readable message, whichever variant this is.
    pub fn text(&self) -> &str {
        match self {
            Self::Native { message, .. } => message,
            Self::Application(err) => &err.message,
        }
    }
}

impl From<AppError> for RaisedError {
    fn from(err: AppError) -> Self {
        Self::Application(err)
    }
}

impl From<String> for RaisedError {
    fn from(message: String) -> Self {
        Self::message(message)
    }
}

impl From<&str> for RaisedError {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<std::io::Error> for RaisedError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<serde_json::Error> for RaisedError {
    fn from(err: serde_json::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for RaisedError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Native {
            message: err.to_string(),
            type_name: "Error".to_string(),
            stack: capture_stack(),
        }
    }
}

fn short_type_name<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    // Strip generic arguments before taking the last path segment.
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn capture_stack() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}
