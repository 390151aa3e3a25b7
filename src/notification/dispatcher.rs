//! Decides how an error is surfaced and performs the side effects.
//!
//! Decision table, evaluated in order:
//! 1. silent: structured log only
//! 2. not fatal: structured log, then a toast
//! 3. fatal: structured log, OS notification, then an error-severity log line
//!
//! Each channel is throttled per group key by the [`RateLimiter`]. Failures
//! reported by the surface are logged and never abort dispatch.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AppError, ToastVariant};
use crate::ratelimit::{Channel, RateLimiter};

use super::{LogRecord, NotificationSurface, Permission, SystemNotification, Toast};

/// Fallback when an error carries no captured backtrace.
pub const NO_STACK_TRACE: &str = "No stack trace available";

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Silent path. `logged` is false when the log window suppressed it.
    Silent { logged: bool },
    /// Non-fatal path.
    Toast { shown: bool, logged: bool },
    /// Fatal path. `notified` is true only if an OS notification was sent.
    Fatal { notified: bool, logged: bool },
}

/// Routes classified errors to the notification surface.
pub struct NotificationDispatcher {
    surface: Arc<dyn NotificationSurface>,
    limiter: Mutex<RateLimiter>,
}

impl NotificationDispatcher {
    pub fn new(surface: Arc<dyn NotificationSurface>, limiter: RateLimiter) -> Self {
        Self {
            surface,
            limiter: Mutex::new(limiter),
        }
    }

    pub fn surface(&self) -> &Arc<dyn NotificationSurface> {
        &self.surface
    }

    /// Locks the rate limiter. Never held across an `.await`.
    pub fn limiter(&self) -> MutexGuard<'_, RateLimiter> {
        self.limiter.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn should_notify(&self, group_key: &str, channel: Channel) -> bool {
        self.limiter().should_notify(group_key, channel)
    }

    /// Records the occurrence and performs the side effects for `error`.
    pub async fn dispatch(&self, error: &AppError, silent: bool) -> Dispatch {
        self.limiter().record(error);

        let logged = self.log_details(error).await;

        if silent {
            return Dispatch::Silent { logged };
        }

        if !error.fatal {
            let shown = self.show_toast(error);
            return Dispatch::Toast { shown, logged };
        }

        let notified = self.notify_system(error).await;
        self.emit(
            LogRecord::error(format!("Fatal error occurred: {}", error.message))
                .with("groupKey", error.group_key.clone())
                .with("stack", stack_or_fallback(error)),
        )
        .await;

        Dispatch::Fatal { notified, logged }
    }

    /// Builds the structured record describing `error`.
    pub fn details_record(error: &AppError) -> LogRecord {
        LogRecord::error(format!("Error details: {}", error.message))
            .with("message", error.message.clone())
            .with("statusCode", error.status_code.to_string())
            .with("groupKey", error.group_key.clone())
            .with("data", error.data_json())
            .with("stack", stack_or_fallback(error))
    }

    async fn log_details(&self, error: &AppError) -> bool {
        if !self.should_notify(&error.group_key, Channel::Log) {
            return false;
        }
        self.emit(Self::details_record(error)).await
    }

    fn show_toast(&self, error: &AppError) -> bool {
        if !self.should_notify(&error.group_key, Channel::Toast) {
            return false;
        }
        self.surface.show_toast(Toast {
            title: format!("Error {}", error.status_code),
            description: error.message.clone(),
            variant: ToastVariant::for_status(error.status_code),
        });
        true
    }

    async fn notify_system(&self, error: &AppError) -> bool {
        if !self.should_notify(&error.group_key, Channel::System) {
            return false;
        }

        if !self.ensure_permission().await {
            tracing::debug!(group_key = %error.group_key, "system notification permission denied");
            return false;
        }

        let notification = SystemNotification {
            title: format!("Fatal Error {}", error.status_code),
            body: error.message.clone(),
        };
        match self.surface.send_notification(notification).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "system notification failed");
                self.emit(LogRecord::warn(e.to_string())).await;
                false
            }
        }
    }

    async fn ensure_permission(&self) -> bool {
        match self.surface.is_permission_granted().await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "permission check failed");
                self.emit(LogRecord::warn(e.to_string())).await;
                return false;
            }
        }
        match self.surface.request_permission().await {
            Ok(permission) => permission == Permission::Granted,
            Err(e) => {
                tracing::warn!(error = %e, "permission request failed");
                self.emit(LogRecord::warn(e.to_string())).await;
                false
            }
        }
    }

    /// Sends a record to the surface's log sink.
    pub(crate) async fn emit(&self, record: LogRecord) -> bool {
        match self.surface.log(record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "log sink rejected record");
                false
            }
        }
    }
}

fn stack_or_fallback(error: &AppError) -> String {
    error
        .stack
        .clone()
        .unwrap_or_else(|| NO_STACK_TRACE.to_string())
}
