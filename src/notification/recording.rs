//! In-memory surface that records every call.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    LogRecord, NavigationTarget, Notification, NotificationSurface, Permission, SurfaceError,
    SystemNotification, Toast,
};

#[derive(Debug)]
struct RecordingState {
    calls: Vec<Notification>,
    permission_granted: bool,
    route: Option<String>,
}

/// A surface that keeps every side effect in memory.
///
/// Useful for tests and for hosts that want to inspect what the pipeline
/// would have shown. Permission answers and failures are configurable.
#[derive(Debug)]
pub struct RecordingSurface {
    state: Mutex<RecordingState>,
    request_answer: Permission,
    fail_send: bool,
    fail_log: bool,
    fail_navigation: bool,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    /// Permission already granted, current route `/`, nothing fails.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecordingState {
                calls: Vec::new(),
                permission_granted: true,
                route: Some("/".to_string()),
            }),
            request_answer: Permission::Granted,
            fail_send: false,
            fail_log: false,
            fail_navigation: false,
        }
    }

    /// Starts with permission undetermined; a request will answer `answer`.
    pub fn with_permission_request(mut self, answer: Permission) -> Self {
        self.request_answer = answer;
        self.lock().permission_granted = false;
        self
    }

    pub fn with_route(self, route: impl Into<String>) -> Self {
        self.lock().route = Some(route.into());
        self
    }

    pub fn without_route(self) -> Self {
        self.lock().route = None;
        self
    }

    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn failing_log(mut self) -> Self {
        self.fail_log = true;
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, call: Notification) {
        self.lock().calls.push(call);
    }

    /// Every recorded side effect, in order.
    pub fn calls(&self) -> Vec<Notification> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Notification::Toast(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn system_notifications(&self) -> Vec<SystemNotification> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Notification::System(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Notification::Log(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<NavigationTarget> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Notification::Navigation(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn permission_requests(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Notification::PermissionRequest(_)))
            .count()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl NotificationSurface for RecordingSurface {
    fn show_toast(&self, toast: Toast) {
        self.push(Notification::Toast(toast));
    }

    async fn is_permission_granted(&self) -> Result<bool, SurfaceError> {
        Ok(self.lock().permission_granted)
    }

    async fn request_permission(&self) -> Result<Permission, SurfaceError> {
        let answer = self.request_answer;
        let mut state = self.lock();
        state.permission_granted = answer == Permission::Granted;
        state.calls.push(Notification::PermissionRequest(answer));
        Ok(answer)
    }

    async fn send_notification(
        &self,
        notification: SystemNotification,
    ) -> Result<(), SurfaceError> {
        if self.fail_send {
            return Err(SurfaceError::Send("notification daemon unavailable".to_string()));
        }
        self.push(Notification::System(notification));
        Ok(())
    }

    async fn log(&self, record: LogRecord) -> Result<(), SurfaceError> {
        if self.fail_log {
            return Err(SurfaceError::Log("log sink closed".to_string()));
        }
        self.push(Notification::Log(record));
        Ok(())
    }

    async fn navigate(&self, target: NavigationTarget) -> Result<(), SurfaceError> {
        if self.fail_navigation {
            return Err(SurfaceError::Navigation(format!("no route matches {}", target.path)));
        }
        let mut state = self.lock();
        state.route = Some(target.to_string());
        state.calls.push(Notification::Navigation(target));
        Ok(())
    }

    fn current_route(&self) -> Option<String> {
        self.lock().route.clone()
    }
}
