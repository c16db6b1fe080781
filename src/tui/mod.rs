mod export;
mod help;
mod state;

use crate::cli::{build_config, build_exporter, Cli};
use crate::engine::HttpBackend;
use crate::model::SessionMessage;
use crate::orchestrator::{self, SessionCommand, SessionPhase};
use crate::view::text::truncate;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use export::{ExportDone, ExportRequest};
use ratatui::{
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Terminal,
};
use state::{KeyAction, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::info;

/// Channels between the UI thread and the async side.
struct UiChannels {
    msg_rx: UnboundedReceiver<SessionMessage>,
    cmd_tx: UnboundedSender<SessionCommand>,
    export_tx: UnboundedSender<ExportRequest>,
    done_rx: UnboundedReceiver<ExportDone>,
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let backend = HttpBackend::new(&cfg)?;

    // Unbounded channels avoid backpressure between the UI thread and the runtime.
    let (msg_tx, msg_rx) = mpsc::unbounded_channel::<SessionMessage>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<SessionCommand>();
    let (export_tx, export_rx) = mpsc::unbounded_channel::<ExportRequest>();
    let (done_tx, done_rx) = mpsc::unbounded_channel::<ExportDone>();

    let worker = tokio::spawn(export::run_export_worker(
        build_exporter(&args),
        export_rx,
        done_tx,
    ));

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let channels = UiChannels {
        msg_rx,
        cmd_tx,
        export_tx,
        done_rx,
    };
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, channels));

    let res =
        orchestrator::run_controller(backend, cfg, args.file.clone(), msg_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    worker.abort();
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(args: Cli, mut ch: UiChannels) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only.
    let mut state = UiState::new(args.layout);
    if args.file.is_none() {
        state.info = "Press n to analyze a CSV file".into();
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        // Drain without blocking; the controller never waits on the UI.
        while let Ok(msg) = ch.msg_rx.try_recv() {
            if state.apply(msg) {
                request_auto_exports(&args, &mut state, &ch.export_tx, terminal_width(&terminal));
            }
            dirty = true;
        }
        while let Ok(done) = ch.done_rx.try_recv() {
            finish_export(&mut state, done);
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &mut state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(k)) = event::read() else {
            dirty = true;
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        dirty = true;
        match state.handle_key(k) {
            KeyAction::None => {}
            KeyAction::Quit => {
                let _ = ch.cmd_tx.send(SessionCommand::Quit);
                break Ok(());
            }
            KeyAction::Command(cmd) => {
                let _ = ch.cmd_tx.send(cmd);
            }
            KeyAction::Export(kind) => {
                let width = terminal_width(&terminal);
                if let Some(report) = state.session.report.clone() {
                    state.exports_running += 1;
                    let _ = ch.export_tx.send(ExportRequest {
                        report,
                        kind,
                        width,
                        layout: state.layout,
                    });
                }
            }
            KeyAction::CopyPath(path) => {
                state.info = match export::copy_to_clipboard(&path) {
                    Ok(()) => format!("✓ Copied to clipboard: {}", truncate(&path, 60)),
                    Err(e) => format!("Clipboard copy failed: {e:#}"),
                };
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn terminal_width(terminal: &Terminal<CrosstermBackend<io::Stdout>>) -> u16 {
    terminal.size().map(|s| s.width).unwrap_or(100)
}

fn request_auto_exports(
    args: &Cli,
    state: &mut UiState,
    export_tx: &UnboundedSender<ExportRequest>,
    width: u16,
) {
    let Some(report) = state.session.report.clone() else {
        return;
    };
    let mut seen = Vec::new();
    for &kind in &args.exports {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        state.exports_running += 1;
        let _ = export_tx.send(ExportRequest {
            report: report.clone(),
            kind,
            width,
            layout: state.layout,
        });
    }
}

fn finish_export(state: &mut UiState, done: ExportDone) {
    state.exports_running = state.exports_running.saturating_sub(1);
    match done.result {
        Ok(path) => {
            info!(path = %path.display(), "export finished");
            state.info = format!(
                "Exported {}: {} (press 'y' to copy path)",
                done.kind.label(),
                path.display()
            );
            state.last_exported_path = Some(path);
        }
        Err(e) => state.info = format!("{} export failed: {e}", done.kind.label()),
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &mut UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_title(rows[0], f, state);
    draw_body(rows[1], f, state);
    draw_status(rows[2], f, state);

    if let Some(text) = state.session.overlay_text() {
        draw_overlay(rows[1], f, text, &state.session.status);
    }
    if state.show_help {
        help::draw_help(area, f);
    }
}

fn draw_title(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut spans = vec![Span::styled(
        " majin-analyzer ",
        Style::default()
            .fg(Color::White)
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(file) = &state.session.file {
        spans.push(Span::raw(format!(" {}", file.display())));
    }
    if let Some(job) = &state.session.job {
        spans.push(Span::styled(
            format!("  job {} · {}", job.id, job.status.as_str()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    spans.push(Span::styled(
        format!("  [{}]", state.layout.as_str()),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_body(area: Rect, f: &mut ratatui::Frame, state: &mut UiState) {
    state.viewport = area.height;
    // Render before clamping so the scroll range matches the current content.
    if state.report_buffer(area.width).is_none() {
        draw_placeholder(area, f, state);
        return;
    }
    state.clamp_scroll();
    let scroll = state.scroll;
    if let Some(buffer) = state.report_buffer(area.width) {
        f.render_widget(
            ReportViewport {
                report: buffer,
                scroll,
            },
            area,
        );
    }
}

fn draw_placeholder(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = vec![Line::from("")];
    match (&state.session.failure, state.session.phase) {
        (Some(failure), SessionPhase::Failed) => {
            lines.push(Line::styled(
                "Analysis failed",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
            lines.push(Line::from(failure.message.clone()));
            lines.push(Line::from(""));
            if state.session.can_retry_fetch() {
                lines.push(Line::from("Press r to retry fetching the result, n for a new analysis."));
            } else {
                lines.push(Line::from("Press n to start a new analysis."));
            }
        }
        _ if state.session.is_busy() => {}
        _ => {
            lines.push(Line::from("No report loaded."));
            lines.push(Line::from("Press n and enter the path of a CSV file to analyze it."));
        }
    }
    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let line = if let Some(input) = &state.prompt {
        Line::from(vec![
            Span::styled("File: ", Style::default().fg(Color::Magenta)),
            Span::raw(input.clone()),
            Span::styled("▏", Style::default().fg(Color::Magenta)),
            Span::styled("  (Enter to start, Esc to cancel)", Style::default().fg(Color::DarkGray)),
        ])
    } else {
        let mut spans = vec![Span::raw(state.info.clone())];
        if state.exports_running > 0 {
            spans.push(Span::styled(
                format!("  [{} export(s) running]", state.exports_running),
                Style::default().fg(Color::Yellow),
            ));
        }
        spans.push(Span::styled(
            "  ?: help  q: quit",
            Style::default().fg(Color::DarkGray),
        ));
        Line::from(spans)
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_overlay(area: Rect, f: &mut ratatui::Frame, text: &str, note: &str) {
    let popup = help::centered(area, 40, if note.is_empty() { 3 } else { 4 });
    let mut lines = vec![Line::styled(
        text.to_string(),
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
    )];
    if !note.is_empty() {
        lines.push(Line::styled(
            truncate(note, usize::from(popup.width.saturating_sub(2))),
            Style::default().fg(Color::DarkGray),
        ));
    }
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(lines)
            .centered()
            .block(Block::default().borders(Borders::ALL)),
        popup,
    );
}

/// Copies the visible slice of the off-screen report into the frame.
struct ReportViewport<'a> {
    report: &'a Buffer,
    scroll: u16,
}

impl Widget for ReportViewport<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let src = self.report.area;
        for row in 0..area.height {
            let sy = self.scroll.saturating_add(row);
            if sy >= src.height {
                break;
            }
            for col in 0..area.width.min(src.width) {
                if let (Some(from), Some(to)) = (
                    self.report.cell((col, sy)),
                    buf.cell_mut((area.x + col, area.y + row)),
                ) {
                    *to = from.clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{fixtures::SAMPLE_REPORT, ReportModel};
    use crate::view::{render_report, row_text, LayoutMode};

    #[test]
    fn viewport_shows_scrolled_rows() {
        let report = ReportModel::from_json(SAMPLE_REPORT.as_bytes()).unwrap();
        let full = render_report(&report, 60, LayoutMode::Stacked);
        let area = Rect::new(0, 0, 60, 5);
        let mut frame = Buffer::empty(area);
        ReportViewport {
            report: &full,
            scroll: 3,
        }
        .render(area, &mut frame);
        for y in 0..5 {
            assert_eq!(row_text(&frame, y), row_text(&full, y + 3));
        }
    }
}
