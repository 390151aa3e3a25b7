//! Options for errors caught by a global catch-all.
//!
//! Errors that escape every local handler reach the application boundary
//! without a caller to decide fatality or grouping. These helpers derive both
//! from where the error surfaced.

use serde_json::Value;

use crate::error::ErrorOptions;

/// Group key used for async failures nobody awaited.
pub const UNHANDLED_REJECTION_KEY: &str = "unhandled-promise-rejection";

/// Where an uncaught error surfaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncaughtContext {
    /// Name of the component that raised the error, if known.
    pub component: Option<String>,
    /// Phase the component was in, e.g. `render` or `lifecycle hook`.
    pub info: Option<String>,
}

impl UncaughtContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }
}

/// Derives handling options for an uncaught error.
///
/// The error is fatal when it came from the IPC bridge (`invoke`/`IPC` in the
/// message) or while rendering or running a lifecycle hook, since the view is
/// then in an unknown state.
pub fn classify_uncaught(message: &str, ctx: &UncaughtContext) -> ErrorOptions {
    let info = ctx.info.as_deref();
    let fatal = message.contains("invoke")
        || message.contains("IPC")
        || info.is_some_and(|i| i.contains("render") || i.contains("lifecycle"));

    let group_key = format!(
        "{}-{}",
        ctx.component.as_deref().unwrap_or("anonymous"),
        info.unwrap_or("unknown")
    );

    let component = ctx
        .component
        .clone()
        .map(Value::String)
        .unwrap_or(Value::Null);
    let error_info = ctx.info.clone().map(Value::String).unwrap_or(Value::Null);

    ErrorOptions::new()
        .fatal(fatal)
        .group_key(group_key)
        .with_data("component", component)
        .with_data("errorInfo", error_info)
}

/// Options for an unhandled async failure.
pub fn unhandled_rejection_options() -> ErrorOptions {
    ErrorOptions::new().group_key(UNHANDLED_REJECTION_KEY)
}
