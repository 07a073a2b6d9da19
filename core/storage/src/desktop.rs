//! Desktop integration seam.

use std::sync::{Mutex, MutexGuard, PoisonError};

use sklad_common::Result;

/// Clipboard, window and notification access.
pub trait Desktop: Send + Sync {
    fn write_clipboard(&self, text: &str) -> Result<()>;

    fn hide_window(&self) -> Result<()>;

    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct Recorded {
    clipboard: Option<String>,
    hides: usize,
    notifications: Vec<(String, String)>,
}

/// Desktop that only records what was asked of it.
#[derive(Debug, Default)]
pub struct MemoryDesktop {
    recorded: Mutex<Recorded>,
}

impl MemoryDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last text written to the clipboard.
    pub fn clipboard(&self) -> Option<String> {
        self.recorded().clipboard.clone()
    }

    pub fn hide_count(&self) -> usize {
        self.recorded().hides
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.recorded().notifications.clone()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Desktop for MemoryDesktop {
    fn write_clipboard(&self, text: &str) -> Result<()> {
        self.recorded().clipboard = Some(text.to_string());
        Ok(())
    }

    fn hide_window(&self) -> Result<()> {
        self.recorded().hides += 1;
        Ok(())
    }

    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.recorded()
            .notifications
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_desktop_records_calls() {
        let desktop = MemoryDesktop::new();
        desktop.write_clipboard("first").unwrap();
        desktop.write_clipboard("second").unwrap();
        desktop.hide_window().unwrap();
        desktop.notify("Sklad", "Copied: Token").unwrap();

        assert_eq!(desktop.clipboard().as_deref(), Some("second"));
        assert_eq!(desktop.hide_count(), 1);
        assert_eq!(
            desktop.notifications(),
            vec![("Sklad".to_string(), "Copied: Token".to_string())]
        );
    }
}
