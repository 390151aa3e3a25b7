//! Terminal-backed surface.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    LogRecord, NavigationTarget, NotificationRenderer, NotificationSurface, Permission, Severity,
    SurfaceError, SystemNotification, Toast,
};

/// Prints toasts, system notifications and redirects to stdout as panels and
/// forwards log records to `tracing`.
pub struct ConsoleSurface {
    renderer: NotificationRenderer,
    notifications_allowed: bool,
    permission_asked: Mutex<bool>,
    route: Mutex<Option<String>>,
}

impl ConsoleSurface {
    pub fn new(renderer: NotificationRenderer) -> Self {
        Self {
            renderer,
            notifications_allowed: true,
            permission_asked: Mutex::new(false),
            route: Mutex::new(None),
        }
    }

    /// Whether a permission request is answered with `Granted`.
    pub fn with_notifications_allowed(mut self, allowed: bool) -> Self {
        self.notifications_allowed = allowed;
        self
    }

    pub fn with_route(self, route: impl Into<String>) -> Self {
        *self.route.lock().unwrap_or_else(|e| e.into_inner()) = Some(route.into());
        self
    }

    fn print(&self, panel: String) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A closed stdout only loses the panel.
        let _ = writeln!(out, "{}", panel);
    }
}

#[async_trait]
impl NotificationSurface for ConsoleSurface {
    fn show_toast(&self, toast: Toast) {
        self.print(self.renderer.render_toast(&toast));
    }

    async fn is_permission_granted(&self) -> Result<bool, SurfaceError> {
        let asked = *self.permission_asked.lock().unwrap_or_else(|e| e.into_inner());
        Ok(asked && self.notifications_allowed)
    }

    async fn request_permission(&self) -> Result<Permission, SurfaceError> {
        *self.permission_asked.lock().unwrap_or_else(|e| e.into_inner()) = true;
        if self.notifications_allowed {
            Ok(Permission::Granted)
        } else {
            Ok(Permission::Denied)
        }
    }

    async fn send_notification(
        &self,
        notification: SystemNotification,
    ) -> Result<(), SurfaceError> {
        self.print(self.renderer.render_system(&notification));
        Ok(())
    }

    async fn log(&self, record: LogRecord) -> Result<(), SurfaceError> {
        let fields = serde_json::to_string(&record.key_values)
            .map_err(|e| SurfaceError::Log(e.to_string()))?;
        match record.severity {
            Severity::Warn => tracing::warn!(fields = %fields, "{}", record.message),
            Severity::Error => tracing::error!(fields = %fields, "{}", record.message),
        }
        Ok(())
    }

    async fn navigate(&self, target: NavigationTarget) -> Result<(), SurfaceError> {
        self.print(self.renderer.render_navigation(&target));
        *self.route.lock().unwrap_or_else(|e| e.into_inner()) = Some(target.to_string());
        Ok(())
    }

    fn current_route(&self) -> Option<String> {
        self.route.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permission_requires_request() {
        let surface = ConsoleSurface::new(NotificationRenderer::new().with_colors(false));
        assert!(!surface.is_permission_granted().await.unwrap());
        assert_eq!(surface.request_permission().await.unwrap(), Permission::Granted);
        assert!(surface.is_permission_granted().await.unwrap());
    }

    #[tokio::test]
    async fn test_denied_permission() {
        let surface = ConsoleSurface::new(NotificationRenderer::new())
            .with_notifications_allowed(false);
        assert_eq!(surface.request_permission().await.unwrap(), Permission::Denied);
        assert!(!surface.is_permission_granted().await.unwrap());
    }

    #[tokio::test]
    async fn test_navigation_updates_route() {
        let surface = ConsoleSurface::new(NotificationRenderer::new().with_colors(false))
            .with_route("/courses");
        assert_eq!(surface.current_route().as_deref(), Some("/courses"));
        surface
            .navigate(NavigationTarget::new("/error").with_query("fatal", "true"))
            .await
            .unwrap();
        assert_eq!(surface.current_route().as_deref(), Some("/error?fatal=true"));
    }

    #[tokio::test]
    async fn test_log_accepts_all_severities() {
        let surface = ConsoleSurface::new(NotificationRenderer::new());
        for severity in [Severity::Warn, Severity::Error] {
            let record = LogRecord::new(severity, "Error details: x").with("statusCode", "500");
            assert!(surface.log(record).await.is_ok());
        }
    }
}
