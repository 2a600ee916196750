//! User-facing output channel.
//!
//! The front end (notebook, terminal) owns presentation; the core only writes
//! lines and updatable displays through these traits.

use std::sync::{Arc, Mutex, PoisonError};

/// A display that can be replaced in place after it was first shown.
pub trait UpdatableDisplay: Send {
    /// Replace the displayed content.
    fn update(&mut self, content: &str);
}

/// Sink for diagnostics and progress shown to the user.
pub trait OutputChannel: Send + Sync {
    /// Write a single line.
    fn write_line(&self, text: &str);

    /// Show content that may be updated later.
    fn display_updatable(&self, content: &str) -> Box<dyn UpdatableDisplay>;
}

/// What the user must do to finish an interactive login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInstructions {
    /// URL to open.
    pub url: String,
    /// Code to enter at `url`, for device-code logins.
    pub user_code: Option<String>,
    /// Full message from the identity provider, if any.
    pub message: Option<String>,
}

impl LoginInstructions {
    fn render(&self) -> String {
        if let Some(ref message) = self.message {
            return message.clone();
        }
        match self.user_code {
            Some(ref code) => format!(
                "To sign in, open {} and enter the code {} to authenticate.",
                self.url, code
            ),
            None => format!("To sign in, complete the login in your browser at {}", self.url),
        }
    }
}

/// Shows login instructions during device-code and interactive flows.
///
/// Called before the flow starts waiting on the identity provider; the
/// returned handle is updated once the login completes or fails.
pub trait LoginPrompt: Send + Sync {
    /// Show the instructions and return a handle for later updates.
    fn show_login_instructions(&self, info: &LoginInstructions) -> Box<dyn UpdatableDisplay>;
}

impl<T: OutputChannel + ?Sized> LoginPrompt for T {
    fn show_login_instructions(&self, info: &LoginInstructions) -> Box<dyn UpdatableDisplay> {
        self.display_updatable(&info.render())
    }
}

/// Output channel that records everything written to it.
#[derive(Debug, Clone, Default)]
pub struct BufferedChannel {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferedChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far (updatable displays included,
    /// showing their latest content).
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl OutputChannel for BufferedChannel {
    fn write_line(&self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }

    fn display_updatable(&self, content: &str) -> Box<dyn UpdatableDisplay> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.push(content.to_string());
        Box::new(BufferedDisplay {
            lines: Arc::clone(&self.lines),
            index: lines.len() - 1,
        })
    }
}

struct BufferedDisplay {
    lines: Arc<Mutex<Vec<String>>>,
    index: usize,
}

impl UpdatableDisplay for BufferedDisplay {
    fn update(&mut self, content: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(line) = lines.get_mut(self.index) {
            *line = content.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_channel_records_lines() {
        let channel = BufferedChannel::new();
        channel.write_line("first");
        channel.write_line("second");
        assert_eq!(channel.lines(), vec!["first", "second"]);
        assert!(channel.contains("sec"));
    }

    #[test]
    fn test_updatable_display_replaces_in_place() {
        let channel = BufferedChannel::new();
        let mut display = channel.display_updatable("waiting");
        channel.write_line("after");
        display.update("done");
        assert_eq!(channel.lines(), vec!["done", "after"]);
    }

    #[test]
    fn test_login_prompt_device_code() {
        let channel = BufferedChannel::new();
        let info = LoginInstructions {
            url: "https://microsoft.com/devicelogin".into(),
            user_code: Some("ABC123".into()),
            message: None,
        };
        let _handle = channel.show_login_instructions(&info);
        assert!(channel.contains("ABC123"));
        assert!(channel.contains("devicelogin"));
    }
}
