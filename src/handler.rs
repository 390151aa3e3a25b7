//! The error handler facade.
//!
//! [`ErrorHandler::handle_error`] is the single entry point callers report
//! through. It resolves the input into an [`AppError`], skips errors that
//! were already handled, dispatches notifications, marks the error handled,
//! and then applies the fatal policy. Per call exactly one of three things
//! happens: a plain return, a redirect to the error route, or the handled
//! error handed back as `Err` for an outer boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::boundary::{classify_uncaught, unhandled_rejection_options, UncaughtContext};
use crate::config::HandlerConfig;
use crate::error::{AppError, ErrorOptions, RaisedError, APP_ERROR_NAME};
use crate::notification::{
    Dispatch, LogRecord, NavigationTarget, NotificationDispatcher, NotificationSurface,
};
use crate::ratelimit::{Clock, ErrorGroup, RateLimiter, SystemClock};

/// What happens after a fatal error has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalPolicy {
    /// Redirect to the error route and return normally.
    #[default]
    Navigate,
    /// Return the handled error as `Err`; an outer boundary routes the user.
    Rethrow,
}

/// How a call to [`ErrorHandler::handle_error`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The error was handled before; nothing happened.
    AlreadyHandled,
    /// Another error was being handled; this one was only logged as secondary.
    Nested,
    /// Silent error, logged only.
    Silent,
    /// Non-fatal error. `toast_shown` is false when the toast window suppressed it.
    Reported { toast_shown: bool },
    /// Fatal error; the user was redirected.
    Navigated(NavigationTarget),
    /// Fatal error raised while already on the error route; no redirect.
    AlreadyOnErrorRoute,
}

/// The result of a call that did not hand the error back.
#[derive(Debug, Clone)]
pub struct Handled {
    pub outcome: Outcome,
    /// The resolved error, so callers can keep propagating it.
    pub error: AppError,
}

/// `Err` carries a fatal error that is already handled.
pub type HandleResult = Result<Handled, AppError>;

/// Releases the handling flag on every exit path.
struct HandlingGuard<'a>(&'a AtomicBool);

impl<'a> HandlingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for HandlingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Classifies, throttles and surfaces errors.
pub struct ErrorHandler {
    dispatcher: NotificationDispatcher,
    config: HandlerConfig,
    handling: AtomicBool,
}

impl ErrorHandler {
    /// Builds a handler around an explicitly owned rate limiter.
    pub fn new(
        surface: Arc<dyn NotificationSurface>,
        limiter: RateLimiter,
        config: HandlerConfig,
    ) -> Self {
        Self {
            dispatcher: NotificationDispatcher::new(surface, limiter),
            config,
            handling: AtomicBool::new(false),
        }
    }

    /// Builds a handler whose limiter follows `config` and the system clock.
    pub fn from_config(surface: Arc<dyn NotificationSurface>, config: HandlerConfig) -> Self {
        Self::with_clock(surface, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        surface: Arc<dyn NotificationSurface>,
        config: HandlerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = RateLimiter::with_clock(config.windows(), clock)
            .with_recent_capacity(config.recent_capacity);
        Self::new(surface, limiter, config)
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Returns true while a `handle_error` call is in progress.
    pub fn is_handling(&self) -> bool {
        self.handling.load(Ordering::Acquire)
    }

    /// Creates an error using this handler's group key strategy.
    pub fn create_error(&self, message: impl Into<String>, options: ErrorOptions) -> AppError {
        RaisedError::Native {
            message: message.into(),
            type_name: APP_ERROR_NAME.to_string(),
            stack: None,
        }
        .into_app_error(&options, self.config.group_key_strategy)
    }

    /// A snapshot of the rate-limiter state for `group_key`.
    pub fn group(&self, group_key: &str) -> Option<ErrorGroup> {
        self.dispatcher.limiter().group(group_key).cloned()
    }

    /// Snapshots of every group seen so far.
    pub fn groups(&self) -> Vec<ErrorGroup> {
        let mut groups: Vec<ErrorGroup> = self.dispatcher.limiter().groups().cloned().collect();
        groups.sort_by(|a, b| a.group_key.cmp(&b.group_key));
        groups
    }

    /// Reports an error.
    ///
    /// # Errors
    ///
    /// Returns the now-handled error when it is fatal and either the policy is
    /// [`FatalPolicy::Rethrow`] or the redirect failed. Silent and non-fatal
    /// errors never come back as `Err`.
    pub async fn handle_error(
        &self,
        error: impl Into<RaisedError>,
        options: ErrorOptions,
    ) -> HandleResult {
        let raised = error.into();
        let strategy = self.config.group_key_strategy;

        if raised.is_handled() {
            return Ok(Handled {
                outcome: Outcome::AlreadyHandled,
                error: raised.into_app_error(&options, strategy),
            });
        }

        let Some(_guard) = HandlingGuard::acquire(&self.handling) else {
            let app_error = raised.into_app_error(&options, strategy);
            tracing::warn!(
                group_key = %app_error.group_key,
                "error raised while handling another error"
            );
            self.dispatcher
                .emit(LogRecord::error(format!(
                    "Additional error while handling error: {}",
                    app_error.message
                )))
                .await;
            return Ok(Handled {
                outcome: Outcome::Nested,
                error: app_error,
            });
        };

        let mut app_error = raised.into_app_error(&options, strategy);
        app_error.begin_handling();
        let dispatch = self.dispatcher.dispatch(&app_error, options.silent).await;
        app_error.mark_handled();

        tracing::debug!(
            group_key = %app_error.group_key,
            status_code = app_error.status_code,
            ?dispatch,
            "error dispatched"
        );

        match dispatch {
            Dispatch::Silent { .. } => Ok(Handled {
                outcome: Outcome::Silent,
                error: app_error,
            }),
            Dispatch::Toast { shown, .. } => Ok(Handled {
                outcome: Outcome::Reported { toast_shown: shown },
                error: app_error,
            }),
            Dispatch::Fatal { .. } => self.propagate_fatal(app_error).await,
        }
    }

    /// Reports an error that reached a global catch-all.
    pub async fn handle_uncaught(
        &self,
        error: impl Into<RaisedError>,
        ctx: &UncaughtContext,
    ) -> HandleResult {
        let raised = error.into();
        let options = classify_uncaught(raised.text(), ctx);
        self.handle_error(raised, options).await
    }

    /// Reports an async failure that nothing awaited.
    pub async fn handle_unhandled_rejection(&self, error: impl Into<RaisedError>) -> HandleResult {
        self.handle_error(error, unhandled_rejection_options()).await
    }

    async fn propagate_fatal(&self, app_error: AppError) -> HandleResult {
        if self.config.fatal_policy == FatalPolicy::Rethrow {
            return Err(app_error);
        }

        let surface = self.dispatcher.surface();
        let from = surface.current_route().unwrap_or_else(|| "/".to_string());
        if self.is_error_route(&from) {
            return Ok(Handled {
                outcome: Outcome::AlreadyOnErrorRoute,
                error: app_error,
            });
        }

        let target = NavigationTarget::new(self.config.error_route.clone())
            .with_query("groupKey", app_error.group_key.clone())
            .with_query("message", app_error.message.clone())
            .with_query("fatal", "true")
            .with_query("from", from);

        match surface.navigate(target.clone()).await {
            Ok(()) => Ok(Handled {
                outcome: Outcome::Navigated(target),
                error: app_error,
            }),
            Err(e) => {
                tracing::error!(error = %e, "redirect to error route failed; handing error back");
                Err(app_error)
            }
        }
    }

    fn is_error_route(&self, route: &str) -> bool {
        let path = route.split('?').next().unwrap_or(route);
        let error_route = self.config.error_route.trim_end_matches('/');
        path == error_route
            || path
                .strip_prefix(error_route)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
