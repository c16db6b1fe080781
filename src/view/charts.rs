//! Chart widgets drawn from a resolved [`ChartRenderSpec`].

use crate::chart::{ChartRenderSpec, LegendPolicy, ValueAxis};
use crate::report::ChartKind;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::Line;
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine};
use ratatui::widgets::Widget;

use super::text::{display_width, truncate};
use super::theme;

/// Rows reserved for the plot of every chart card.
pub const CHART_HEIGHT: u16 = 12;

const LOWER_EIGHTHS: [&str; 8] = ["▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];
const FULL_BLOCK: &str = "█";
const UPPER_HALF: &str = "▀";
const LOWER_HALF: &str = "▄";
const MAX_BAR_WIDTH: u16 = 12;
const DOUGHNUT_CUTOUT: f64 = 0.5;

/// Parse `#rrggbb`. Anything else maps to the terminal default color.
pub fn hex_to_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return Color::Reset;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
    match (channel(0), channel(2), channel(4)) {
        (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
        _ => Color::Reset,
    }
}

/// Draw a chart into `area`.
pub fn render_chart(spec: &ChartRenderSpec, area: Rect, buf: &mut Buffer) {
    if area.width < 4 || area.height < 3 {
        return;
    }
    if spec.values.is_empty() {
        buf.set_string(area.x, area.y, "No data", theme::muted());
        return;
    }
    match (spec.kind, spec.value_axis.as_ref()) {
        (ChartKind::Bar, Some(axis)) => render_bar(spec, axis, area, buf),
        (ChartKind::Line, Some(axis)) => render_line(spec, axis, area, buf),
        _ => render_radial(spec, area, buf),
    }
}

/// Geometry shared by the cartesian charts: tick gutter on the left,
/// category labels on the bottom row.
struct Cartesian {
    plot: Rect,
    min: f64,
    max: f64,
}

impl Cartesian {
    fn layout(axis: &ValueAxis, area: Rect, buf: &mut Buffer) -> Self {
        let gutter = axis
            .ticks
            .iter()
            .map(|t| display_width(&t.label))
            .max()
            .unwrap_or(1) as u16
            + 2;
        let gutter = gutter.min(area.width / 3).max(2);
        let plot = Rect {
            x: area.x + gutter,
            y: area.y,
            width: area.width.saturating_sub(gutter),
            height: area.height.saturating_sub(1),
        };
        let geo = Self {
            plot,
            min: axis.min(),
            max: axis.max(),
        };

        for tick in &axis.ticks {
            let row = geo.row_of(tick.value).round() as u16;
            let y = plot.y + row.min(plot.height.saturating_sub(1));
            let label = truncate(&tick.label, usize::from(gutter.saturating_sub(2)));
            let x = area.x + gutter - 2 - display_width(&label) as u16;
            buf.set_string(x, y, &label, theme::muted());
            buf.set_string(area.x + gutter - 1, y, "┤", theme::border());
        }
        geo
    }

    /// Fractional row (0 = top) at which `value` sits.
    fn row_of(&self, value: f64) -> f64 {
        let span = (self.max - self.min).max(f64::EPSILON);
        (self.max - value) / span * f64::from(self.plot.height)
    }

    /// Column slot of category `i` out of `n`.
    fn slot(&self, i: usize, n: usize) -> (u16, u16) {
        let w = f64::from(self.plot.width) / n as f64;
        let start = (i as f64 * w).floor() as u16;
        let end = ((i + 1) as f64 * w).floor() as u16;
        (self.plot.x + start, end.saturating_sub(start).max(1))
    }

    fn draw_category_labels(&self, labels: &[String], buf: &mut Buffer) {
        let y = self.plot.y + self.plot.height;
        let n = labels.len();
        for (i, label) in labels.iter().enumerate() {
            let (x, w) = self.slot(i, n);
            centered(buf, x, w, y, label, theme::muted());
        }
    }
}

fn centered(buf: &mut Buffer, x: u16, width: u16, y: u16, text: &str, style: Style) {
    let text = truncate(text, usize::from(width));
    let pad = width.saturating_sub(display_width(&text) as u16) / 2;
    buf.set_string(x + pad, y, &text, style);
}

fn render_bar(spec: &ChartRenderSpec, axis: &ValueAxis, area: Rect, buf: &mut Buffer) {
    let geo = Cartesian::layout(axis, area, buf);
    if geo.plot.width == 0 || geo.plot.height == 0 {
        return;
    }
    let n = spec.values.len();
    let zero = geo.row_of(0.0);

    for (i, value) in spec.values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        let color = hex_to_color(spec.colors.color_at(i));
        let (slot_x, slot_w) = geo.slot(i, n);
        let bar_w = (slot_w * 2 / 3).clamp(1, MAX_BAR_WIDTH);
        let bar_x = slot_x + (slot_w - bar_w) / 2;
        let top = geo.row_of(*value);

        let (from, to) = if *value >= 0.0 { (top, zero) } else { (zero, top) };
        for row in 0..geo.plot.height {
            let cell_top = f64::from(row);
            let covered = (to.min(cell_top + 1.0) - from.max(cell_top)).clamp(0.0, 1.0);
            if covered <= 0.0 {
                continue;
            }
            // Partial cells only occur at the far end of a positive bar.
            let symbol = if covered >= 1.0 || *value < 0.0 {
                FULL_BLOCK
            } else {
                let eighths = (covered * 8.0).round() as usize;
                if eighths == 0 {
                    continue;
                }
                LOWER_EIGHTHS[eighths - 1]
            };
            for dx in 0..bar_w {
                if let Some(cell) = buf.cell_mut((bar_x + dx, geo.plot.y + row)) {
                    cell.set_symbol(symbol).set_fg(color);
                }
            }
        }

        // Data label sits just above the end of the bar.
        let end_row = if *value >= 0.0 { top.floor() } else { top.ceil() };
        let label_row = if *value >= 0.0 { end_row - 1.0 } else { end_row };
        let label_row = label_row.clamp(0.0, f64::from(geo.plot.height - 1)) as u16;
        centered(
            buf,
            slot_x,
            slot_w,
            geo.plot.y + label_row,
            &spec.value_labels[i],
            theme::data_label(),
        );
    }

    geo.draw_category_labels(&spec.labels, buf);
}

fn render_line(spec: &ChartRenderSpec, axis: &ValueAxis, area: Rect, buf: &mut Buffer) {
    let geo = Cartesian::layout(axis, area, buf);
    if geo.plot.width == 0 || geo.plot.height == 0 {
        return;
    }
    let n = spec.values.len();
    let color = hex_to_color(spec.colors.color_at(0));
    let indexed: Vec<(usize, f64, f64)> = spec
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (i, i as f64 + 0.5, *v))
        .collect();
    let points: Vec<(f64, f64)> = indexed.iter().map(|&(_, x, y)| (x, y)).collect();
    let x_per_col = n as f64 / f64::from(geo.plot.width);
    let y_per_row = (geo.max - geo.min) / f64::from(geo.plot.height);

    Canvas::default()
        .marker(Marker::HalfBlock)
        .x_bounds([0.0, n as f64])
        .y_bounds([geo.min, geo.max])
        .paint(|ctx| {
            for pair in points.windows(2) {
                ctx.draw(&CanvasLine::new(
                    pair[0].0, pair[0].1, pair[1].0, pair[1].1, color,
                ));
            }
            if let [(x, y)] = points.as_slice() {
                ctx.draw(&CanvasLine::new(*x, *y, *x, *y, color));
            }
            ctx.layer();
            for &(i, x, y) in &indexed {
                let label = &spec.value_labels[i];
                let half = display_width(label) as f64 / 2.0 * x_per_col;
                let above = (y + y_per_row).min(geo.max - y_per_row * 0.5);
                ctx.print(
                    (x - half).max(0.0),
                    above,
                    Line::styled(label.clone(), theme::data_label()),
                );
            }
        })
        .render(geo.plot, buf);

    geo.draw_category_labels(&spec.labels, buf);
}

fn render_radial(spec: &ChartRenderSpec, area: Rect, buf: &mut Buffer) {
    let legend_w = match spec.legend {
        LegendPolicy::Side => legend_width(spec).min(area.width / 2),
        LegendPolicy::Hidden => 0,
    };
    let plot = Rect {
        width: area.width.saturating_sub(legend_w + 1),
        ..area
    };

    let total: f64 = spec.values.iter().filter(|v| v.is_finite()).map(|v| v.max(0.0)).sum();
    if total > 0.0 {
        draw_disc(spec, total, plot, buf);
    } else {
        buf.set_string(plot.x, plot.y, "No data", theme::muted());
    }

    if legend_w > 0 {
        let legend = Rect {
            x: plot.x + plot.width + 1,
            width: legend_w,
            ..area
        };
        draw_legend(spec, total, legend, buf);
    }
}

/// Pixels are half cells, which are close to square in a terminal.
fn draw_disc(spec: &ChartRenderSpec, total: f64, plot: Rect, buf: &mut Buffer) {
    let px_h = f64::from(plot.height) * 2.0;
    let diameter = px_h.min(f64::from(plot.width));
    let radius = diameter / 2.0;
    let inner = if spec.kind == ChartKind::Doughnut {
        radius * DOUGHNUT_CUTOUT
    } else {
        0.0
    };
    let cx = f64::from(plot.width) / 2.0;
    let cy = px_h / 2.0;

    let mut bounds = Vec::with_capacity(spec.values.len());
    let mut acc = 0.0;
    for v in &spec.values {
        acc += if v.is_finite() { v.max(0.0) } else { 0.0 };
        bounds.push(acc / total);
    }

    let pixel = |px: f64, py: f64| -> Option<Color> {
        let (dx, dy) = (px + 0.5 - cx, py + 0.5 - cy);
        let r = dx.hypot(dy);
        if r > radius || r < inner {
            return None;
        }
        // Clockwise from twelve o'clock.
        let turn = dx.atan2(-dy).rem_euclid(std::f64::consts::TAU) / std::f64::consts::TAU;
        let idx = bounds.iter().position(|b| turn < *b).unwrap_or(bounds.len() - 1);
        Some(hex_to_color(spec.colors.color_at(idx)))
    };

    for row in 0..plot.height {
        for col in 0..plot.width {
            let top = pixel(f64::from(col), f64::from(row) * 2.0);
            let bottom = pixel(f64::from(col), f64::from(row) * 2.0 + 1.0);
            let Some(cell) = buf.cell_mut((plot.x + col, plot.y + row)) else {
                continue;
            };
            match (top, bottom) {
                (Some(t), Some(b)) => {
                    cell.set_symbol(UPPER_HALF).set_fg(t).set_bg(b);
                }
                (Some(t), None) => {
                    cell.set_symbol(UPPER_HALF).set_fg(t);
                }
                (None, Some(b)) => {
                    cell.set_symbol(LOWER_HALF).set_fg(b);
                }
                (None, None) => {}
            }
        }
    }
}

fn legend_entry(spec: &ChartRenderSpec, total: f64, i: usize) -> String {
    let share = if total > 0.0 && spec.values[i].is_finite() {
        spec.values[i].max(0.0) / total * 100.0
    } else {
        0.0
    };
    format!(
        "{}  {} ({:.0}%)",
        spec.labels[i], spec.value_labels[i], share
    )
}

fn legend_width(spec: &ChartRenderSpec) -> u16 {
    let total = spec.total();
    (0..spec.values.len())
        .map(|i| display_width(&legend_entry(spec, total, i)) + 2)
        .max()
        .unwrap_or(0) as u16
}

fn draw_legend(spec: &ChartRenderSpec, total: f64, area: Rect, buf: &mut Buffer) {
    let rows = usize::from(area.height);
    let n = spec.values.len();
    let shown = if n > rows { rows.saturating_sub(1) } else { n };
    let text_w = usize::from(area.width.saturating_sub(2));

    for i in 0..shown {
        let y = area.y + i as u16;
        let color = hex_to_color(spec.colors.color_at(i));
        buf.set_string(area.x, y, "■", Style::default().fg(color));
        let entry = truncate(&legend_entry(spec, total, i), text_w);
        buf.set_string(area.x + 2, y, &entry, Style::default());
    }
    if shown < n {
        let more = format!("+{} more", n - shown);
        buf.set_string(
            area.x + 2,
            area.y + shown as u16,
            truncate(&more, text_w),
            theme::muted().add_modifier(Modifier::ITALIC),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::resolve;
    use crate::report::{ChartSpec, SeriesData};
    use serde_json::Map;

    fn spec(kind: ChartKind, pairs: &[(&str, f64)]) -> ChartRenderSpec {
        let data: SeriesData = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let spec = ChartSpec {
            id: "c".into(),
            title: "Chart".into(),
            kind,
            extra: Map::new(),
        };
        resolve(&spec, &data)
    }

    fn rendered(spec: &ChartRenderSpec, w: u16, h: u16) -> Buffer {
        let area = Rect::new(0, 0, w, h);
        let mut buf = Buffer::empty(area);
        render_chart(spec, area, &mut buf);
        buf
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "))
            .collect()
    }

    fn count_symbol(buf: &Buffer, symbol: &str) -> usize {
        buf.content.iter().filter(|c| c.symbol() == symbol).count()
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(hex_to_color("#2563eb"), Color::Rgb(0x25, 0x63, 0xeb));
        assert_eq!(hex_to_color("nope"), Color::Reset);
    }

    #[test]
    fn bars_show_labels_and_values() {
        let s = spec(ChartKind::Bar, &[("Tokyo", 1200.0), ("Osaka", 800.0)]);
        let buf = rendered(&s, 40, CHART_HEIGHT);
        let bottom = row_text(&buf, CHART_HEIGHT - 1);
        assert!(bottom.contains("Tokyo"));
        assert!(bottom.contains("Osaka"));
        let all: String = (0..CHART_HEIGHT).map(|y| row_text(&buf, y)).collect();
        assert!(all.contains("1,200"));
        assert!(all.contains("800"));
        assert!(count_symbol(&buf, FULL_BLOCK) > 0);
    }

    #[test]
    fn taller_value_gets_taller_bar() {
        let s = spec(ChartKind::Bar, &[("a", 100.0), ("b", 400.0)]);
        let buf = rendered(&s, 40, CHART_HEIGHT);
        let filled = |x_range: std::ops::Range<u16>| {
            (0..CHART_HEIGHT)
                .filter(|&y| {
                    x_range
                        .clone()
                        .any(|x| buf.cell((x, y)).is_some_and(|c| c.symbol() == FULL_BLOCK))
                })
                .count()
        };
        let mid = buf.area.width / 2 + 3;
        assert!(filled(mid..buf.area.width) > filled(0..mid));
    }

    #[test]
    fn line_chart_plots_points() {
        let s = spec(ChartKind::Line, &[("Jan", 10.0), ("Feb", 14.5), ("Mar", 9.0)]);
        let buf = rendered(&s, 50, CHART_HEIGHT);
        let marks = count_symbol(&buf, UPPER_HALF)
            + count_symbol(&buf, LOWER_HALF)
            + count_symbol(&buf, FULL_BLOCK);
        assert!(marks > 0);
        let all: String = (0..CHART_HEIGHT).map(|y| row_text(&buf, y)).collect();
        assert!(all.contains("14.5"));
        assert!(row_text(&buf, CHART_HEIGHT - 1).contains("Feb"));
    }

    #[test]
    fn doughnut_has_legend_and_hole() {
        let s = spec(ChartKind::Doughnut, &[("A", 5.0), ("B", 3.0), ("C", 1.0)]);
        let buf = rendered(&s, 60, CHART_HEIGHT);
        let all: String = (0..CHART_HEIGHT).map(|y| row_text(&buf, y)).collect();
        assert!(all.contains("A  5 (56%)"));
        assert!(all.contains("C  1 (11%)"));

        // Center of the disc stays empty for a doughnut.
        let legend_w = legend_width(&s);
        let plot_w = 60 - (legend_w + 1);
        let center = buf.cell((plot_w / 2, CHART_HEIGHT / 2)).unwrap();
        assert_eq!(center.symbol(), " ");
    }

    #[test]
    fn pie_is_filled_in_the_middle() {
        let s = spec(ChartKind::Pie, &[("A", 1.0), ("B", 1.0)]);
        let buf = rendered(&s, 60, CHART_HEIGHT);
        let legend_w = legend_width(&s);
        let plot_w = 60 - (legend_w + 1);
        let center = buf.cell((plot_w / 2, CHART_HEIGHT / 2)).unwrap();
        assert_eq!(center.symbol(), UPPER_HALF);
    }

    #[test]
    fn legend_truncates_long_category_lists() {
        let pairs: Vec<(String, f64)> = (0..20).map(|i| (format!("c{i}"), 1.0)).collect();
        let refs: Vec<(&str, f64)> = pairs.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let s = spec(ChartKind::Pie, &refs);
        let buf = rendered(&s, 60, 6);
        let all: String = (0..6).map(|y| row_text(&buf, y)).collect();
        assert!(all.contains("+15 more"));
    }
}
