//! Off-screen report rendering.
//!
//! The whole report is drawn into one ratatui [`Buffer`] of exactly the
//! height it needs. The TUI scrolls through that buffer and the PDF export
//! rasterizes it, so both show the same thing.

pub mod charts;
pub mod raster;
pub mod text;

use crate::chart::{resolve, ChartRenderSpec};
use crate::format::{format_compact, format_grouped, report_date};
use crate::report::ReportModel;
use clap::ValueEnum;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Widget};
use text::{display_width, markdown_lines, truncate, wrap};

/// Narrowest width the report is laid out for.
pub const MIN_WIDTH: u16 = 40;

const HEADER_HEIGHT: u16 = 4;
const METRIC_CARD_HEIGHT: u16 = 4;
const METRIC_CARD_MIN_WIDTH: u16 = 22;
const GAP: u16 = 1;
const GRID_COLUMNS: u16 = 2;
/// Border plus one column of padding on each side.
const CARD_INSET: u16 = 2;

/// Styles shared by the view modules.
pub(crate) mod theme {
    use super::charts::hex_to_color;
    use crate::chart::ACCENT_COLOR;
    use ratatui::style::{Color, Modifier, Style};

    pub const MUTED: Color = Color::Rgb(0x64, 0x74, 0x8b);
    pub const BORDER: Color = Color::Rgb(0xcb, 0xd5, 0xe1);

    pub fn accent() -> Style {
        Style::default().fg(hex_to_color(ACCENT_COLOR))
    }

    pub fn heading() -> Style {
        accent().add_modifier(Modifier::BOLD)
    }

    pub fn muted() -> Style {
        Style::default().fg(MUTED)
    }

    pub fn border() -> Style {
        Style::default().fg(BORDER)
    }

    pub fn code() -> Style {
        Style::default().fg(Color::Rgb(0x0e, 0xa5, 0xe9))
    }

    pub fn data_label() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    pub fn value() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LayoutMode {
    /// One chart per row.
    #[default]
    Stacked,
    /// Two charts per row.
    Grid,
}

impl LayoutMode {
    pub fn toggle(self) -> Self {
        match self {
            LayoutMode::Stacked => LayoutMode::Grid,
            LayoutMode::Grid => LayoutMode::Stacked,
        }
    }

    fn columns(self) -> u16 {
        match self {
            LayoutMode::Stacked => 1,
            LayoutMode::Grid => GRID_COLUMNS,
        }
    }

    fn chart_height(self) -> u16 {
        match self {
            LayoutMode::Stacked => charts::CHART_HEIGHT + 2,
            LayoutMode::Grid => charts::CHART_HEIGHT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutMode::Stacked => "stacked",
            LayoutMode::Grid => "grid",
        }
    }
}

enum Piece<'a> {
    Header,
    RowCount,
    Metric { label: &'a str, value: f64 },
    Chart {
        spec: ChartRenderSpec,
        insight: Vec<Line<'static>>,
        chart_height: u16,
    },
    AiReport(Vec<Line<'static>>),
    Footer,
}

struct Plan<'a> {
    width: u16,
    height: u16,
    pieces: Vec<(Rect, Piece<'a>)>,
}

/// Split `total` into `n` widths that differ by at most one column.
fn split_even(total: u16, n: u16) -> Vec<u16> {
    let n = n.max(1);
    let base = total / n;
    let extra = total % n;
    (0..n).map(|i| base + u16::from(i < extra)).collect()
}

fn plan(report: &ReportModel, width: u16, layout: LayoutMode) -> Plan<'_> {
    let width = width.max(MIN_WIDTH);
    let mut pieces = Vec::new();
    let mut y = 0;

    pieces.push((Rect::new(0, y, width, HEADER_HEIGHT), Piece::Header));
    y += HEADER_HEIGHT + GAP;

    // Metric cards: the row count first, then metrics in payload order.
    let mut cards = vec![Piece::RowCount];
    cards.extend(
        report
            .metrics()
            .map(|(key, value)| Piece::Metric {
                label: report.metric_label(key),
                value,
            }),
    );
    let per_row = (width / METRIC_CARD_MIN_WIDTH).max(1);
    let mut cards = cards.into_iter().peekable();
    while cards.peek().is_some() {
        let row: Vec<Piece<'_>> = cards.by_ref().take(usize::from(per_row)).collect();
        let mut x = 0;
        for (piece, w) in row.into_iter().zip(split_even(width, per_row)) {
            pieces.push((Rect::new(x, y, w, METRIC_CARD_HEIGHT), piece));
            x += w;
        }
        y += METRIC_CARD_HEIGHT;
    }
    y += GAP;

    // Chart cards, `columns` per row; a row is as tall as its tallest card.
    let columns = layout.columns();
    let widths = split_even(width, columns);
    let chart_height = layout.chart_height();
    let entries: Vec<_> = report.charts().collect();
    for row in entries.chunks(usize::from(columns)) {
        let mut x = 0;
        let mut row_pieces = Vec::new();
        for (entry, &w) in row.iter().zip(&widths) {
            let inner_w = w.saturating_sub(2 * CARD_INSET);
            let insight = entry
                .insight
                .map(|text| wrap(&markdown_lines(text), inner_w))
                .unwrap_or_default();
            row_pieces.push((
                x,
                w,
                Piece::Chart {
                    spec: resolve(entry.spec, entry.data),
                    insight,
                    chart_height,
                },
            ));
            x += w;
        }
        let row_h = row_pieces
            .iter()
            .map(|(_, _, p)| piece_height(p))
            .max()
            .unwrap_or(0);
        for (x, w, piece) in row_pieces {
            pieces.push((Rect::new(x, y, w, row_h), piece));
        }
        y += row_h + GAP;
    }

    let report_lines = if report.ai_report().trim().is_empty() {
        vec![Line::styled("No report text.", theme::muted())]
    } else {
        wrap(
            &markdown_lines(report.ai_report()),
            width.saturating_sub(2 * CARD_INSET),
        )
    };
    let ai_h = report_lines.len() as u16 + 2;
    pieces.push((Rect::new(0, y, width, ai_h), Piece::AiReport(report_lines)));
    y += ai_h + GAP;

    pieces.push((Rect::new(0, y, width, 1), Piece::Footer));
    y += 1;

    Plan {
        width,
        height: y,
        pieces,
    }
}

fn piece_height(piece: &Piece<'_>) -> u16 {
    match piece {
        Piece::Chart {
            insight,
            chart_height,
            ..
        } => {
            let insight_h = if insight.is_empty() {
                0
            } else {
                insight.len() as u16 + 1
            };
            2 + chart_height + insight_h
        }
        Piece::AiReport(lines) => lines.len() as u16 + 2,
        Piece::Header => HEADER_HEIGHT,
        Piece::RowCount | Piece::Metric { .. } => METRIC_CARD_HEIGHT,
        Piece::Footer => 1,
    }
}

/// Total rows the report occupies at `width`.
pub fn report_height(report: &ReportModel, width: u16, layout: LayoutMode) -> u16 {
    plan(report, width, layout).height
}

/// Render the full report into a buffer `width` columns wide (at least
/// [`MIN_WIDTH`]) and exactly as tall as the content.
pub fn render_report(report: &ReportModel, width: u16, layout: LayoutMode) -> Buffer {
    let plan = plan(report, width, layout);
    let mut buf = Buffer::empty(Rect::new(0, 0, plan.width, plan.height));
    for (area, piece) in &plan.pieces {
        draw_piece(report, piece, *area, &mut buf);
    }
    buf
}

fn card(title: Option<Line<'static>>) -> Block<'static> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::border());
    match title {
        Some(t) => block.title(t),
        None => block,
    }
}

/// Inner area of a card, with one column of horizontal padding.
fn padded(block: &Block<'_>, area: Rect) -> Rect {
    let inner = block.inner(area);
    Rect {
        x: inner.x + 1,
        width: inner.width.saturating_sub(2),
        ..inner
    }
}

fn draw_piece(report: &ReportModel, piece: &Piece<'_>, area: Rect, buf: &mut Buffer) {
    match piece {
        Piece::Header => draw_header(report, area, buf),
        Piece::RowCount => draw_metric(
            "ROWS",
            &format_grouped(report.total_rows() as f64),
            area,
            buf,
        ),
        Piece::Metric { label, value } => {
            let value = format!("¥{}", format_compact(Some(*value)));
            draw_metric(label, &value, area, buf);
        }
        Piece::Chart {
            spec,
            insight,
            chart_height,
        } => {
            let title = Line::from(vec![
                Span::styled(" ▌", theme::accent()),
                Span::styled(format!("{} ", spec.title), theme::value()),
            ]);
            let block = card(Some(title));
            let inner = padded(&block, area);
            block.render(area, buf);
            let plot = Rect {
                height: (*chart_height).min(inner.height),
                ..inner
            };
            charts::render_chart(spec, plot, buf);
            if !insight.is_empty() {
                let text_area = Rect {
                    y: plot.y + plot.height + 1,
                    height: inner.height.saturating_sub(plot.height + 1),
                    ..inner
                };
                buf.set_string(inner.x, plot.y + plot.height, "»", theme::accent());
                Paragraph::new(insight.clone())
                    .style(theme::muted())
                    .render(text_area, buf);
            }
        }
        Piece::AiReport(lines) => {
            let title = Line::styled(" AI STRATEGIC INSIGHT REPORT ", theme::heading());
            let block = card(Some(title)).border_style(theme::accent());
            let inner = padded(&block, area);
            block.render(area, buf);
            Paragraph::new(lines.clone()).render(inner, buf);
        }
        Piece::Footer => {
            let text = format!("majin-analyzer {}", env!("CARGO_PKG_VERSION"));
            let x = area.width.saturating_sub(display_width(&text) as u16) / 2;
            buf.set_string(area.x + x, area.y, text, theme::muted());
        }
    }
}

fn draw_header(report: &ReportModel, area: Rect, buf: &mut Buffer) {
    let block = card(None).border_style(theme::accent());
    let inner = padded(&block, area);
    block.render(area, buf);

    let job = report.job_id().unwrap_or("-");
    let date = report_date(report.processed_at());
    let lines = vec![
        Line::styled("MAJIN STRATEGIC REPORT", theme::heading()),
        Line::styled(
            truncate(&format!("Job {job}  ·  {date}"), usize::from(inner.width)),
            theme::muted(),
        ),
    ];
    Paragraph::new(lines).render(inner, buf);
}

fn draw_metric(label: &str, value: &str, area: Rect, buf: &mut Buffer) {
    let block = card(None);
    let inner = padded(&block, area);
    block.render(area, buf);
    let w = usize::from(inner.width);
    let lines = vec![
        Line::styled(truncate(&label.to_uppercase(), w), theme::muted()),
        Line::styled(truncate(value, w), theme::value()),
    ];
    Paragraph::new(lines).render(inner, buf);
}

/// Plain text of one buffer row, for tests and text output.
pub fn row_text(buf: &Buffer, y: u16) -> String {
    (buf.area.x..buf.area.x + buf.area.width)
        .filter_map(|x| buf.cell((x, y)))
        .map(|c| c.symbol())
        .collect()
}
