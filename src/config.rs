use std::path::PathBuf;

use clap::Parser;

use crate::calc::Mode;
use crate::error_log::ErrorLogStore;
use crate::history::HistorySlot;

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Position-size calculator for SP1! and NQ1!")]
pub struct CliParams {
    /// Directory holding the calculation history and the error log
    #[clap(
        short = 'd',
        long = "data-dir",
        env = "TRADE_CALC_DATA_DIR",
        value_name = "DIR",
        default_value = "."
    )]
    pub data_dir: PathBuf,

    /// Instrument selected at startup (SP1! or NQ1!)
    #[clap(short = 'm', long = "mode", value_name = "MODE", default_value = "SP1!")]
    pub mode: Mode,

    /// Do not touch the system clipboard; copied values are only shown in the status bar
    #[clap(long = "no-clipboard")]
    pub no_clipboard: bool,
}

impl CliParams {
    pub fn history_slot(&self) -> HistorySlot {
        HistorySlot::in_dir(&self.data_dir)
    }

    pub fn error_log(&self) -> ErrorLogStore {
        ErrorLogStore::in_dir(&self.data_dir)
    }
}
