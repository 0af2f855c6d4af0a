use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::calc::{self, Mode};
use crate::clipboard::ClipboardSink;
use crate::error_log::{ErrorLogStore, ErrorSource};
use crate::history::{CalculationRecord, MAX_HISTORY};
use crate::session::{CalculatorSession, SessionError};

const MAX_POINT_CHARS: usize = 24;
const PANEL_WIDTH: u16 = 52;
const COPY_FEEDBACK: Duration = Duration::from_secs(2);
const FOOTER_TEXT: &str = "Trading System V2.1.0";

pub struct TuiApp {
    session: CalculatorSession,
    clipboard: Box<dyn ClipboardSink>,
    error_log: ErrorLogStore,
    last_draw: Instant,
    min_redraw_gap: Duration,
    status_message: Option<String>,
    status_visible_until: Option<Instant>,
    status_is_error: bool,
    copied_until: Option<Instant>,
    clear_confirmation: bool,
    exit_confirmation: bool,
}

impl TuiApp {
    pub fn new(
        session: CalculatorSession,
        clipboard: Box<dyn ClipboardSink>,
        error_log: ErrorLogStore,
    ) -> TuiApp {
        let min_redraw_gap = Duration::from_millis(100);
        let mut app = TuiApp {
            session,
            clipboard,
            error_log,
            last_draw: Instant::now() - min_redraw_gap,
            min_redraw_gap,
            status_message: None,
            status_visible_until: None,
            status_is_error: false,
            copied_until: None,
            clear_confirmation: false,
            exit_confirmation: false,
        };
        app.log_history_recovery();
        app.announce_loaded_history();
        app
    }

    pub fn dispose(&self) {
        ratatui::restore();
    }

    pub async fn run(&mut self) -> Result<()> {
        color_eyre::install()?;
        let mut terminal = ratatui::init();
        let mut input_tick = tokio::time::interval(self.min_redraw_gap);
        terminal.draw(|frame| self.render(frame))?;
        self.last_draw = Instant::now();
        loop {
            input_tick.tick().await;
            let mut should_redraw = self.expire_feedback(Instant::now());
            match self.poll_input()? {
                InputOutcome::Exit => return Ok(()),
                InputOutcome::Handled => should_redraw = true,
                InputOutcome::Idle => {}
            }
            if should_redraw && self.last_draw.elapsed() >= self.min_redraw_gap {
                terminal.draw(|frame| self.render(frame))?;
                self.last_draw = Instant::now();
            }
        }
    }

    fn log_history_recovery(&mut self) {
        if let Some(err) = self.session.history_mut().take_recovery() {
            self.log_error(ErrorSource::History, format!("starting with empty history: {err}"));
        }
    }

    fn announce_loaded_history(&mut self) {
        let history = self.session.history();
        if history.is_empty() {
            return;
        }
        let message = format!(
            "Loaded {} calculations from {}",
            history.len(),
            history.slot().path().display()
        );
        self.set_status_message(message);
    }

    fn log_error(&mut self, source: ErrorSource, message: String) {
        if let Err(err) = self.error_log.append_message(source, message) {
            let path = self.error_log.path().display().to_string();
            self.set_error_status_message(format!("cannot write {path}: {err}"));
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(3));
        self.status_is_error = false;
    }

    fn set_error_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(5));
        self.status_is_error = true;
    }

    /// Drops the status line and the "Copied!" badge once they have expired.
    fn expire_feedback(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some(until) = self.copied_until {
            if now >= until {
                self.copied_until = None;
                self.session.reset_copied();
                changed = true;
            }
        }
        if let Some(until) = self.status_visible_until {
            if now >= until {
                self.status_message = None;
                self.status_visible_until = None;
                self.status_is_error = false;
                changed = true;
            }
        }
        changed
    }

    fn poll_input(&mut self) -> Result<InputOutcome> {
        let mut outcome = InputOutcome::Idle;
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if self.handle_key_event(key) {
                        return Ok(InputOutcome::Exit);
                    }
                    outcome = InputOutcome::Handled;
                }
                Event::Resize(_, _) => outcome = InputOutcome::Handled,
                _ => {}
            }
        }
        Ok(outcome)
    }

    /// Returns `true` when the application should exit.
    fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        if self.exit_confirmation {
            return self.handle_exit_confirmation_key(key);
        }
        if self.clear_confirmation {
            self.handle_clear_confirmation_key(key);
            return false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.exit_confirmation = true;
            }
            KeyCode::Enter => self.calculate(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
                self.session.select_mode(self.session.mode().toggled());
                self.session.reset_copied();
                self.copied_until = None;
            }
            KeyCode::Char('c') | KeyCode::Char('C') => self.copy_last_result(),
            KeyCode::Char('x') | KeyCode::Char('X') | KeyCode::Delete => {
                if !self.session.history().is_empty() {
                    self.clear_confirmation = true;
                }
            }
            KeyCode::Backspace => {
                let mut text = self.session.point_text().to_string();
                text.pop();
                self.session.set_point_text(text);
            }
            KeyCode::Char(ch) if is_point_char(ch) => {
                let mut text = self.session.point_text().to_string();
                if text.chars().count() < MAX_POINT_CHARS {
                    text.push(ch);
                    self.session.set_point_text(text);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_exit_confirmation_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('y')
            | KeyCode::Char('Y')
            | KeyCode::Char('q')
            | KeyCode::Char('Q')
            | KeyCode::Enter => {
                self.exit_confirmation = false;
                true
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.exit_confirmation = false;
                false
            }
            _ => false,
        }
    }

    fn handle_clear_confirmation_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.clear_confirmation = false;
                self.clear_history();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.clear_confirmation = false;
            }
            _ => {}
        }
    }

    fn calculate(&mut self) {
        match self.session.calculate() {
            Ok(Some(_)) => {
                self.copied_until = None;
            }
            Ok(None) => {}
            Err(SessionError::Calc(err)) => {
                self.set_error_status_message(format!("{err}: enter a non-zero number"));
            }
            Err(SessionError::History(err)) => {
                self.copied_until = None;
                let message = format!("result not saved: {err}");
                self.log_error(ErrorSource::History, message.clone());
                self.set_error_status_message(message);
            }
        }
    }

    fn copy_last_result(&mut self) {
        match self.session.copy_last_result(self.clipboard.as_mut()) {
            Ok(Some(text)) => {
                self.copied_until = Some(Instant::now() + COPY_FEEDBACK);
                self.set_status_message(format!("Copied {text}"));
            }
            Ok(None) => {}
            Err(err) => {
                let message = format!("copy failed: {err:#}");
                self.log_error(ErrorSource::Clipboard, message.clone());
                self.set_error_status_message(message);
            }
        }
    }

    fn clear_history(&mut self) {
        match self.session.clear_history() {
            Ok(()) => self.set_status_message("History cleared"),
            Err(err) => {
                let message = format!("history cleared in memory only: {err}");
                self.log_error(ErrorSource::History, message.clone());
                self.set_error_status_message(message);
            }
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = centered_column(frame.area(), PANEL_WIDTH);
        let result_height = if self.session.result().is_some() { 5 } else { 0 };
        let status_height = if self.status_message.is_some() { 3 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(result_height),
                Constraint::Min(0),
                Constraint::Length(status_height),
                Constraint::Length(1),
            ])
            .split(area);
        self.render_header(frame, chunks[0]);
        self.render_mode_selector(frame, chunks[1]);
        self.render_point_input(frame, chunks[2]);
        self.render_key_hints(frame, chunks[3]);
        if result_height > 0 {
            self.render_result(frame, chunks[4]);
        }
        self.render_history(frame, chunks[5]);
        if status_height > 0 {
            self.render_status(frame, chunks[6]);
        }
        let footer = Paragraph::new(Line::from(Span::styled(
            FOOTER_TEXT,
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(footer, chunks[7]);
        if self.clear_confirmation {
            render_confirmation(
                frame,
                "Clear all recent activity?",
                "Y/Enter clear · N/Esc keep",
                "Clear History",
            );
        }
        if self.exit_confirmation {
            render_confirmation(
                frame,
                "Quit the calculator?",
                "Y/Enter quit · N/Esc stay",
                "Quit",
            );
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let header = Paragraph::new(Line::from(Span::styled(
            "TRADING",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        frame.render_widget(header, area);
    }

    fn render_mode_selector(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        for (idx, mode) in Mode::ALL.iter().enumerate() {
            if idx > 0 {
                spans.push(Span::raw("   "));
            }
            let label = format!(" {} ", mode.label());
            let style = if *mode == self.session.mode() {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::LightBlue)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(label, style));
        }
        let selector = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(Block::bordered().title("Mode"));
        frame.render_widget(selector, area);
    }

    fn render_point_input(&self, frame: &mut Frame, area: Rect) {
        let text = self.session.point_text();
        let value = if text.is_empty() {
            Span::styled("0.00", Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(
                format!("{text}▏"),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
        };
        let inner_width = area.width.saturating_sub(2) as usize;
        let unit = "PTS";
        let used = value.width() + unit.len();
        let gap = " ".repeat(inner_width.saturating_sub(used).max(1));
        let line = Line::from(vec![
            value,
            Span::raw(gap),
            Span::styled(unit, Style::default().fg(Color::DarkGray)),
        ]);
        let input = Paragraph::new(line).block(
            Block::bordered()
                .title("Point Input")
                .border_style(Style::default().fg(Color::LightBlue)),
        );
        frame.render_widget(input, area);
    }

    fn render_key_hints(&self, frame: &mut Frame, area: Rect) {
        let enter_style = if self.session.can_calculate() {
            Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let mut spans = vec![
            Span::styled("Enter calculate", enter_style),
            Span::raw(" · Tab mode"),
        ];
        if self.session.result().is_some() {
            spans.push(Span::raw(" · c copy"));
        }
        if !self.session.history().is_empty() {
            spans.push(Span::raw(" · x clear"));
        }
        spans.push(Span::raw(" · q quit"));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_result(&self, frame: &mut Frame, area: Rect) {
        let Some(value) = self.session.result() else {
            return;
        };
        let copy_label = if self.session.copied() {
            Span::styled(
                " Copied! ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled("Copy to Clipboard (c)", Style::default().fg(Color::DarkGray))
        };
        let lines = vec![
            Line::from(Span::styled(
                calc::format_result(value),
                Style::default()
                    .fg(Color::LightBlue)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(copy_label),
        ];
        let result = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered().title("Calculated Value"));
        frame.render_widget(result, area);
    }

    fn render_history(&self, frame: &mut Frame, area: Rect) {
        let entries = self.session.history().entries();
        if entries.is_empty() || area.height < 3 {
            return;
        }
        let inner_width = area.width.saturating_sub(2) as usize;
        let visible = area.height.saturating_sub(2) as usize;
        let lines: Vec<Line> = entries
            .iter()
            .take(visible)
            .map(|entry| history_row(entry, inner_width))
            .collect();
        let title = format!("Recent Activity {}/{MAX_HISTORY}", entries.len());
        let history = Paragraph::new(lines).block(Block::bordered().title(title));
        frame.render_widget(history, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some(message) = &self.status_message {
            let color = if self.status_is_error {
                Color::Red
            } else {
                Color::Yellow
            };
            let status = Paragraph::new(message.as_str())
                .style(Style::default().fg(color))
                .alignment(Alignment::Left)
                .block(Block::bordered().title("Status"));
            frame.render_widget(status, area);
        }
    }
}

enum InputOutcome {
    Idle,
    Handled,
    Exit,
}

fn is_point_char(ch: char) -> bool {
    ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+')
}

fn mode_badge_style(mode: Mode) -> Style {
    let color = match mode {
        Mode::Sp1 => Color::LightBlue,
        Mode::Nq1 => Color::LightGreen,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn history_row(entry: &CalculationRecord, width: usize) -> Line<'static> {
    let mode = format_column_value(entry.mode().label(), ColumnAlign::Left, 5);
    let time = entry.created_at().format("%H:%M").to_string();
    let result_width = 8;
    let point_width = width.saturating_sub(5 + 1 + 5 + 1 + result_width + 1);
    let point = format_column_value(
        &format!("Pt: {}", calc::format_point(entry.point())),
        ColumnAlign::Left,
        point_width,
    );
    let result = format_column_value(
        &calc::format_result(entry.result()),
        ColumnAlign::Right,
        result_width,
    );
    Line::from(vec![
        Span::styled(mode, mode_badge_style(entry.mode())),
        Span::raw(" "),
        Span::styled(time, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::raw(point),
        Span::raw(" "),
        Span::styled(
            result,
            Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::BOLD),
        ),
    ])
}

fn render_confirmation(frame: &mut Frame, question: &str, keys: &str, title: &str) {
    let area = frame.area();
    if area.width < 24 || area.height < 5 {
        return;
    }
    let popup_width = area.width.saturating_sub(20).clamp(28, 40).min(area.width);
    let popup_height = 4;
    let left = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let top = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup = Rect::new(left, top, popup_width, popup_height);
    let lines = vec![
        Line::from(Span::styled(
            question.to_string(),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(keys.to_string()),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Left)
        .block(Block::bordered().title(title.to_string()));
    frame.render_widget(Clear, popup);
    frame.render_widget(paragraph, popup);
}

fn centered_column(area: Rect, max_width: u16) -> Rect {
    let width = area.width.min(max_width);
    let left = area.x + (area.width - width) / 2;
    Rect::new(left, area.y, width, area.height)
}

#[derive(Clone, Copy)]
enum ColumnAlign {
    Left,
    Right,
}

fn format_column_value(value: &str, align: ColumnAlign, width: usize) -> String {
    let clipped = clip_to_width(value, width);
    pad_to_width(&clipped, width, align)
}

fn clip_to_width(value: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(value) <= width {
        return value.to_string();
    }
    let mut result = String::new();
    let mut remaining = width.saturating_sub(1);
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if ch_width > remaining {
            break;
        }
        result.push(ch);
        remaining = remaining.saturating_sub(ch_width);
    }
    result.push('…');
    result
}

fn pad_to_width(value: &str, width: usize, align: ColumnAlign) -> String {
    let current = UnicodeWidthStr::width(value);
    if current >= width {
        return value.to_string();
    }
    let padding = " ".repeat(width - current);
    match align {
        ColumnAlign::Left => format!("{value}{padding}"),
        ColumnAlign::Right => format!("{padding}{value}"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use anyhow::{Result as AnyResult, anyhow};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::clipboard::DisabledClipboard;
    use crate::history::{HistorySlot, HistoryStore};

    struct FailingClipboard;

    impl ClipboardSink for FailingClipboard {
        fn copy_text(&mut self, _text: &str) -> AnyResult<()> {
            Err(anyhow!("no display"))
        }
    }

    struct Fixture {
        dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir =
                std::env::temp_dir().join(format!("trade-calc-tui-{}", rand::random::<u64>()));
            fs::create_dir_all(&dir).expect("create temp dir");
            Fixture { dir }
        }

        fn app(&self, clipboard: Box<dyn ClipboardSink>) -> TuiApp {
            let store = HistoryStore::load(HistorySlot::in_dir(&self.dir));
            TuiApp::new(
                CalculatorSession::new(Mode::Sp1, store),
                clipboard,
                ErrorLogStore::in_dir(&self.dir),
            )
        }

        fn app_with_slot(&self, slot: HistorySlot) -> TuiApp {
            TuiApp::new(
                CalculatorSession::new(Mode::Sp1, HistoryStore::load(slot)),
                Box::new(DisabledClipboard),
                ErrorLogStore::in_dir(&self.dir),
            )
        }

        fn error_log(&self) -> String {
            fs::read_to_string(ErrorLogStore::in_dir(&self.dir).path()).unwrap_or_default()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn press(app: &mut TuiApp, code: KeyCode) -> bool {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    #[test]
    fn typing_and_enter_records_a_calculation() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        type_text(&mut app, "1a0");
        assert_eq!(app.session.point_text(), "10");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.result().map(calc::format_result).as_deref(), Some("0.5"));
        assert_eq!(app.session.history().len(), 1);
    }

    #[test]
    fn tab_switches_mode_and_hides_result() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        type_text(&mut app, "5");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.session.mode(), Mode::Nq1);
        assert!(app.session.result().is_none());
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.result().map(calc::format_result).as_deref(), Some("1.3"));
    }

    #[test]
    fn zero_point_shows_error_without_history() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        type_text(&mut app, "0");
        press(&mut app, KeyCode::Enter);
        assert!(app.status_is_error);
        assert!(app.session.history().is_empty());
    }

    #[test]
    fn copy_feedback_expires() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        type_text(&mut app, "10");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('c'));
        assert!(app.session.copied());
        assert!(app.expire_feedback(Instant::now() + COPY_FEEDBACK + Duration::from_secs(10)));
        assert!(!app.session.copied());
        assert!(app.status_message.is_none());
    }

    #[test]
    fn clipboard_failure_is_logged() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(FailingClipboard));
        type_text(&mut app, "10");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('c'));
        assert!(!app.session.copied());
        assert!(app.status_is_error);
        assert!(fixture.error_log().contains("no display"));
    }

    #[test]
    fn clear_requires_confirmation() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        type_text(&mut app, "10");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.session.history().len(), 1);
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.session.history().is_empty());
        assert!(!HistorySlot::in_dir(&fixture.dir).path().exists());
    }

    #[test]
    fn quit_asks_first() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert!(!press(&mut app, KeyCode::Esc));
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert!(press(&mut app, KeyCode::Char('y')));
        assert!(app.handle_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn corrupt_history_is_logged_not_shown() {
        let fixture = Fixture::new();
        fs::write(HistorySlot::in_dir(&fixture.dir).path(), "[{]").expect("write");
        let app = fixture.app(Box::new(DisabledClipboard));
        assert!(app.session.history().is_empty());
        assert!(app.status_message.is_none());
        assert!(fixture.error_log().contains("starting with empty history"));
    }

    #[test]
    fn renders_result_and_history() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        type_text(&mut app, "10");
        press(&mut app, KeyCode::Enter);
        let mut terminal = Terminal::new(TestBackend::new(60, 30)).expect("test terminal");
        terminal.draw(|frame| app.render(frame)).expect("draw");
        let buffer = terminal.backend().buffer();
        let text: String = buffer
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Calculated Value"));
        assert!(text.contains("Recent Activity 1/10"));
        assert!(text.contains("Pt: 10"));
    }

    fn screen_text(app: &TuiApp, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).expect("test terminal");
        terminal.draw(|frame| app.render(frame)).expect("draw");
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn confirmation_popups_fit_narrow_terminals() {
        let fixture = Fixture::new();
        let mut app = fixture.app(Box::new(DisabledClipboard));
        type_text(&mut app, "10");
        press(&mut app, KeyCode::Enter);
        for width in 24..=30 {
            press(&mut app, KeyCode::Char('x'));
            screen_text(&app, width, 10);
            press(&mut app, KeyCode::Char('n'));
            press(&mut app, KeyCode::Char('q'));
            screen_text(&app, width, 10);
            press(&mut app, KeyCode::Char('n'));
        }
        assert_eq!(app.session.history().len(), 1);
        press(&mut app, KeyCode::Char('q'));
        let text = screen_text(&app, 25, 10);
        assert!(text.contains("Quit the calculator?"));
    }

    #[test]
    fn unsaved_result_stays_visible_and_is_logged() {
        let fixture = Fixture::new();
        let blocker = fixture.dir.join("blocker");
        fs::write(&blocker, "not a directory").expect("write blocker");
        let mut app = fixture.app_with_slot(HistorySlot::new(blocker.join("history.json")));
        type_text(&mut app, "10");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.result().map(calc::format_result).as_deref(), Some("0.5"));
        assert_eq!(app.session.history().len(), 1);
        assert!(app.status_is_error);
        assert!(
            app.status_message
                .as_deref()
                .is_some_and(|message| message.starts_with("result not saved"))
        );
        assert!(fixture.error_log().contains("result not saved"));
    }

    #[test]
    fn clips_long_columns() {
        assert_eq!(format_column_value("abcdef", ColumnAlign::Left, 4), "abc…");
        assert_eq!(format_column_value("1.3", ColumnAlign::Right, 5), "  1.3");
    }
}
