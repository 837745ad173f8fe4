// ABOUTME: Notification sink for user-visible notices and sync progress
// ABOUTME: Terminal implementation prints notices and draws a spinner

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

pub const NOTICE_PREFIX: &str = "Readwise Atoms: ";

pub trait Notifier {
    /// User-visible message.
    fn notice(&self, message: &str);

    /// Diagnostic message.
    fn log(&self, message: &str);

    /// Ephemeral progress text; an empty string clears it.
    fn set_status_bar_text(&self, text: &str, should_log: bool);
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn notice(&self, message: &str) {
        (**self).notice(message)
    }

    fn log(&self, message: &str) {
        (**self).log(message)
    }

    fn set_status_bar_text(&self, text: &str, should_log: bool) {
        (**self).set_status_bar_text(text, should_log)
    }
}

pub struct TerminalNotifier {
    prefix: String,
    spinner: Mutex<Option<ProgressBar>>,
    show_progress: bool,
}

impl TerminalNotifier {
    pub fn new() -> Self {
        TerminalNotifier {
            prefix: NOTICE_PREFIX.to_string(),
            spinner: Mutex::new(None),
            show_progress: true,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn format_notice(&self, message: &str) -> String {
        format!("{}{}", self.prefix, message)
    }

    fn spinner(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TerminalNotifier {
    fn notice(&self, message: &str) {
        let line = self.format_notice(message);
        match self.spinner().as_ref() {
            Some(pb) => pb.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }

    fn log(&self, message: &str) {
        log::info!("{}", message);
    }

    fn set_status_bar_text(&self, text: &str, should_log: bool) {
        if should_log && !text.is_empty() {
            self.log(text);
        }
        if !self.show_progress {
            return;
        }

        let mut spinner = self.spinner();
        if text.is_empty() {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
            return;
        }

        let pb = spinner.get_or_insert_with(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });
        pb.set_message(text.to_string());
    }
}
