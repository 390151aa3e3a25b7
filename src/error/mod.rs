//! Error model and classification.
//!
//! This module provides the structured [`AppError`] value handed to the
//! pipeline, the tagged [`RaisedError`] input it is resolved from, and the
//! status code taxonomy used to style notifications.

pub mod app_error;
pub mod classification;

// Re-export main types for convenient access
pub use app_error::{
    create_error, AppError, ErrorOptions, ErrorState, GroupKeyStrategy, RaisedError,
    APP_ERROR_NAME, DEFAULT_STATUS_CODE,
};
pub use classification::{StatusClass, ToastVariant};
