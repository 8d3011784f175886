//! Clipboard sinks for generated chapters.

use crate::error::{ChapterError, Result};
use std::sync::{Arc, Mutex};

/// Somewhere to put the final chapter text
pub trait ClipboardSink: Send + Sync {
    fn set_text(&self, text: &str) -> Result<()>;
}

impl<T: ClipboardSink + ?Sized> ClipboardSink for Arc<T> {
    fn set_text(&self, text: &str) -> Result<()> {
        (**self).set_text(text)
    }
}

/// In-memory clipboard, used by tests and headless runs
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut contents = self
            .contents
            .lock()
            .map_err(|e| ChapterError::Clipboard(e.to_string()))?;
        *contents = Some(text.to_string());
        Ok(())
    }
}

/// The desktop clipboard
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    clipboard: Mutex<arboard::Clipboard>,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| ChapterError::Clipboard(e.to_string()))?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }
}

#[cfg(feature = "clipboard")]
impl ClipboardSink for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut clipboard = self
            .clipboard
            .lock()
            .map_err(|e| ChapterError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ChapterError::Clipboard(e.to_string()))
    }
}
