use anyhow::Result as AnyResult;
use thiserror::Error;

use crate::calc::{self, CalcError, Mode};
use crate::clipboard::ClipboardSink;
use crate::history::{CalculationRecord, HistoryError, HistoryStore};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Calc(#[from] CalcError),
    /// The calculation succeeded and is in memory, but could not be persisted.
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Form state of the calculator screen plus the history it owns.
#[derive(Debug)]
pub struct CalculatorSession {
    mode: Mode,
    point_text: String,
    result: Option<f64>,
    copied: bool,
    history: HistoryStore,
}

impl CalculatorSession {
    pub fn new(mode: Mode, history: HistoryStore) -> Self {
        CalculatorSession {
            mode,
            point_text: String::new(),
            result: None,
            copied: false,
            history,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn point_text(&self) -> &str {
        &self.point_text
    }

    pub fn result(&self) -> Option<f64> {
        self.result
    }

    pub fn copied(&self) -> bool {
        self.copied
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn can_calculate(&self) -> bool {
        !self.point_text.is_empty()
    }

    /// Switching instruments hides the previous result.
    pub fn select_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.result = None;
    }

    pub fn set_point_text(&mut self, text: impl Into<String>) {
        self.point_text = text.into();
    }

    /// Returns `Ok(None)` while the point field is empty.
    pub fn calculate(&mut self) -> Result<Option<f64>, SessionError> {
        if !self.can_calculate() {
            return Ok(None);
        }
        let point = calc::parse_point(&self.point_text)?;
        let value = calc::position_size(self.mode, point);
        self.result = Some(value);
        self.copied = false;
        self.history
            .record(CalculationRecord::new(self.mode, point, value))?;
        Ok(Some(value))
    }

    /// Copies the displayed result with one decimal. Returns the copied text,
    /// or `None` when no result is shown.
    pub fn copy_last_result(&mut self, sink: &mut dyn ClipboardSink) -> AnyResult<Option<String>> {
        let Some(value) = self.result else {
            return Ok(None);
        };
        let text = calc::format_result(value);
        sink.copy_text(&text)?;
        self.copied = true;
        Ok(Some(text))
    }

    pub fn reset_copied(&mut self) {
        self.copied = false;
    }

    pub fn clear_history(&mut self) -> Result<(), HistoryError> {
        self.history.clear()
    }
}
