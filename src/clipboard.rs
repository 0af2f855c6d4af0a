use anyhow::{Context, Result};
use arboard::Clipboard;

/// Destination for copied results.
pub trait ClipboardSink {
    fn copy_text(&mut self, text: &str) -> Result<()>;
}

/// The desktop clipboard.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn copy_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard = Clipboard::new().context("failed to access clipboard")?;
        clipboard
            .set_text(text.to_string())
            .context("failed to copy to clipboard")
    }
}

/// Used with `--no-clipboard`: the value is only shown in the status bar.
pub struct DisabledClipboard;

impl ClipboardSink for DisabledClipboard {
    fn copy_text(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}
