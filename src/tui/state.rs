use crate::export::ExportKind;
use crate::model::SessionMessage;
use crate::orchestrator::{SessionCommand, SessionView};
use crate::view::{self, LayoutMode};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::buffer::Buffer;
use std::path::PathBuf;

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Quit,
    Command(SessionCommand),
    Export(ExportKind),
    CopyPath(String),
}

/// Off-screen render of the current report, reused until one of its inputs
/// changes.
struct RenderedReport {
    session: u64,
    width: u16,
    layout: LayoutMode,
    buffer: Buffer,
}

pub struct UiState {
    pub session: SessionView,
    pub layout: LayoutMode,
    pub scroll: u16,
    /// Rows of the report viewport at the last draw.
    pub viewport: u16,
    pub show_help: bool,
    pub info: String,
    /// Path being typed after `n`; `None` when no prompt is open.
    pub prompt: Option<String>,
    pub last_exported_path: Option<PathBuf>,
    pub exports_running: usize,
    rendered: Option<RenderedReport>,
}

impl UiState {
    pub fn new(layout: LayoutMode) -> Self {
        Self {
            session: SessionView::default(),
            layout,
            scroll: 0,
            viewport: 0,
            show_help: false,
            info: String::new(),
            prompt: None,
            last_exported_path: None,
            exports_running: 0,
            rendered: None,
        }
    }

    /// Fold a controller message in. Returns true when a report just became
    /// ready for the current session.
    pub fn apply(&mut self, msg: SessionMessage) -> bool {
        let before = self.session.session;
        let had_report = self.session.report.is_some();
        if !self.session.apply(msg) {
            return false;
        }
        if self.session.session != before {
            self.scroll = 0;
            self.rendered = None;
        }
        if let Some(failure) = &self.session.failure {
            self.info = failure.message.clone();
        }
        !had_report && self.session.report.is_some()
    }

    /// The report rendered at `width`, or `None` before a report exists.
    pub fn report_buffer(&mut self, width: u16) -> Option<&Buffer> {
        let report = self.session.report.as_ref()?;
        let width = width.max(view::MIN_WIDTH);
        let stale = !matches!(
            &self.rendered,
            Some(r) if r.session == self.session.session && r.width == width && r.layout == self.layout
        );
        if stale {
            self.rendered = Some(RenderedReport {
                session: self.session.session,
                width,
                layout: self.layout,
                buffer: view::render_report(report, width, self.layout),
            });
        }
        let rendered = self.rendered.as_ref()?;
        Some(&rendered.buffer)
    }

    fn content_height(&self) -> u16 {
        self.rendered
            .as_ref()
            .map(|r| r.buffer.area.height)
            .unwrap_or(0)
    }

    pub fn max_scroll(&self) -> u16 {
        self.content_height().saturating_sub(self.viewport)
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let next = (i32::from(self.scroll) + delta).clamp(0, i32::from(self.max_scroll()));
        self.scroll = next as u16;
    }

    pub fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll());
    }

    fn page(&self) -> i32 {
        i32::from(self.viewport.saturating_sub(2).max(1))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyAction::Quit;
        }
        if self.prompt.is_some() {
            return self.handle_prompt_key(key);
        }
        if self.show_help {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Tab | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return KeyAction::None;
        }

        match key.code {
            KeyCode::Char('q') => KeyAction::Quit,
            KeyCode::Char('?') | KeyCode::Tab => {
                self.show_help = true;
                KeyAction::None
            }
            KeyCode::Char('n') => {
                self.prompt = Some(String::new());
                KeyAction::None
            }
            KeyCode::Char('p') => self.export(ExportKind::Pdf),
            KeyCode::Char('h') => self.export(ExportKind::Html),
            KeyCode::Char('j') => self.export(ExportKind::Json),
            KeyCode::Char('l') => {
                self.layout = self.layout.toggle();
                self.info = format!("Layout: {}", self.layout.as_str());
                KeyAction::None
            }
            KeyCode::Char('r') => {
                if self.session.can_retry_fetch() {
                    self.info = "Retrying result fetch…".into();
                    KeyAction::Command(SessionCommand::RetryFetch)
                } else {
                    self.info = "Nothing to retry".into();
                    KeyAction::None
                }
            }
            KeyCode::Char('y') => match &self.last_exported_path {
                Some(path) => KeyAction::CopyPath(path.display().to_string()),
                None => {
                    self.info = "No exported file yet. Export first (p/h/j)".into();
                    KeyAction::None
                }
            },
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll_by(-1);
                KeyAction::None
            }
            KeyCode::Down => {
                self.scroll_by(1);
                KeyAction::None
            }
            KeyCode::PageUp => {
                self.scroll_by(-self.page());
                KeyAction::None
            }
            KeyCode::PageDown | KeyCode::Char(' ') => {
                self.scroll_by(self.page());
                KeyAction::None
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.scroll = 0;
                KeyAction::None
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.scroll = self.max_scroll();
                KeyAction::None
            }
            _ => KeyAction::None,
        }
    }

    fn export(&mut self, kind: ExportKind) -> KeyAction {
        if self.session.report.is_none() {
            self.info = "No report to export yet".into();
            return KeyAction::None;
        }
        self.info = format!("Exporting {}…", kind.label());
        KeyAction::Export(kind)
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> KeyAction {
        let Some(input) = self.prompt.as_mut() else {
            return KeyAction::None;
        };
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                KeyAction::None
            }
            KeyCode::Enter => {
                let path = input.trim().to_string();
                self.prompt = None;
                if path.is_empty() {
                    return KeyAction::None;
                }
                self.info = format!("Starting analysis of {path}");
                KeyAction::Command(SessionCommand::NewAnalysis(PathBuf::from(path)))
            }
            KeyCode::Backspace => {
                input.pop();
                KeyAction::None
            }
            KeyCode::Char(c) => {
                input.push(c);
                KeyAction::None
            }
            _ => KeyAction::None,
        }
    }
}
