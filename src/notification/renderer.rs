//! Terminal panels for toasts, system notifications and redirects.
//!
//! Used by [`super::ConsoleSurface`] so that a terminal host shows the same
//! information a graphical host would put in a toast or an OS notification.

use owo_colors::{OwoColorize, Rgb};

use super::{NavigationTarget, SystemNotification, Toast};
use crate::error::ToastVariant;

/// 24-bit RGB palette for notification panels.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Destructive toasts and fatal notifications - red (239, 68, 68)
    pub error: Rgb,
    /// Warning toasts - yellow (234, 179, 8)
    pub warning: Rgb,
    /// Informational toasts - blue (59, 130, 246)
    pub info: Rgb,
    /// Unauthorized toasts - purple (168, 85, 247)
    pub unauthorized: Rgb,
    /// Secondary text - gray (107, 114, 128)
    pub muted: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            error: Rgb(239, 68, 68),
            warning: Rgb(234, 179, 8),
            info: Rgb(59, 130, 246),
            unauthorized: Rgb(168, 85, 247),
            muted: Rgb(107, 114, 128),
        }
    }
}

impl Theme {
    pub fn for_variant(&self, variant: ToastVariant) -> Rgb {
        match variant {
            ToastVariant::Destructive => self.error,
            ToastVariant::Warning => self.warning,
            ToastVariant::Info => self.info,
            ToastVariant::Unauthorized => self.unauthorized,
        }
    }
}

/// Renders notification values as bordered terminal panels.
#[derive(Debug, Clone)]
pub struct NotificationRenderer {
    theme: Theme,
    width: usize,
    colored: bool,
}

impl Default for NotificationRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationRenderer {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            width: 60,
            colored: true,
        }
    }

    /// Sets the panel width. Values below 10 are raised to 10.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(10);
        self
    }

    /// Turns ANSI colors on or off.
    pub fn with_colors(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    fn paint(&self, text: &str, color: Rgb, bold: bool) -> String {
        match (self.colored, bold) {
            (false, _) => text.to_string(),
            (true, true) => text.color(color).bold().to_string(),
            (true, false) => text.color(color).to_string(),
        }
    }

    /// Safely truncates a string to the given maximum character count.
    fn safe_truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", truncated)
        }
    }

    fn panel(&self, header: &str, color: Rgb, lines: &[(String, Option<Rgb>)]) -> String {
        let inner_width = self.width - 2;
        let border = "─".repeat(inner_width);
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.paint(&border, color, false)));
        output.push_str(&format!(" {}\n", self.paint(header, color, true)));
        output.push_str(&format!("{}\n", self.paint(&border, color, false)));

        for (line, line_color) in lines {
            let text = Self::safe_truncate(line, inner_width.saturating_sub(2));
            match line_color {
                Some(c) => output.push_str(&format!(" {}\n", self.paint(&text, *c, false))),
                None => output.push_str(&format!(" {}\n", text)),
            }
        }

        output.push_str(&self.paint(&border, color, false));
        output
    }

    pub fn render_toast(&self, toast: &Toast) -> String {
        let color = self.theme.for_variant(toast.variant);
        self.panel(
            &toast.title,
            color,
            &[
                (toast.description.clone(), None),
                (format!("variant: {}", toast.variant), Some(self.theme.muted)),
            ],
        )
    }

    pub fn render_system(&self, notification: &SystemNotification) -> String {
        self.panel(
            &notification.title,
            self.theme.error,
            &[
                (notification.body.clone(), None),
                ("System notification".to_string(), Some(self.theme.muted)),
            ],
        )
    }

    pub fn render_navigation(&self, target: &NavigationTarget) -> String {
        let mut lines = vec![(format!("Redirecting to {}", target.path), None)];
        for (key, value) in &target.query {
            lines.push((format!("{}: {}", key, value), Some(self.theme.muted)));
        }
        self.panel("Fatal Error", self.theme.error, &lines)
    }
}
