//! Cortex error pipeline
//!
//! Classifies client-side errors, throttles repeated reports per group, and
//! surfaces them as toasts, OS notifications, structured logs or a redirect
//! to a dedicated error route.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cortex_errors::{create_error, ErrorHandler, ErrorOptions, HandlerConfig, RecordingSurface};
//!
//! # async fn run() {
//! let surface = Arc::new(RecordingSurface::new());
//! let handler = ErrorHandler::from_config(surface.clone(), HandlerConfig::default());
//!
//! let err = create_error("Lesson not found", ErrorOptions::new().status_code(404));
//! let handled = handler.handle_error(err, ErrorOptions::default()).await;
//! assert!(handled.is_ok());
//! assert_eq!(surface.toasts().len(), 1);
//! # }
//! ```

pub mod boundary;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod notification;
pub mod ratelimit;
pub mod replay;

pub use boundary::UncaughtContext;
pub use config::{ConfigError, HandlerConfig};
pub use error::{create_error, AppError, ErrorOptions, RaisedError};
pub use handler::{ErrorHandler, FatalPolicy, HandleResult, Handled, Outcome};
pub use notification::{ConsoleSurface, NotificationSurface, RecordingSurface};
pub use ratelimit::{Channel, RateLimiter, RateLimitWindows};
