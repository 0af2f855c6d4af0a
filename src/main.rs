mod calc;
mod clipboard;
mod config;
mod error_log;
mod history;
mod session;
mod tui;

use anyhow::{Context, anyhow};
use clap::Parser;

use crate::clipboard::{ClipboardSink, DisabledClipboard, SystemClipboard};
use crate::history::HistoryStore;
use crate::session::CalculatorSession;
use crate::tui::TuiApp;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    let param = config::CliParams::parse();
    std::fs::create_dir_all(&param.data_dir)
        .with_context(|| format!("cannot create data dir {}", param.data_dir.display()))?;

    let history = HistoryStore::load(param.history_slot());
    let session = CalculatorSession::new(param.mode, history);
    let clipboard: Box<dyn ClipboardSink> = if param.no_clipboard {
        Box::new(DisabledClipboard)
    } else {
        Box::new(SystemClipboard)
    };

    let mut app = TuiApp::new(session, clipboard, param.error_log());
    let app_result = tokio::select! {
        result = app.run() => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    app.dispose();
    app_result.map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}
