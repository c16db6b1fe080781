use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const KEYS: [(&str, &str); 11] = [
    ("n", "New analysis (prompts for a file)"),
    ("p", "Export PDF"),
    ("h", "Export HTML"),
    ("j", "Export JSON"),
    ("l", "Toggle stacked / grid layout"),
    ("r", "Retry the result fetch after a fetch failure"),
    ("y", "Copy last exported path to clipboard"),
    ("↑/↓ k", "Scroll"),
    ("PgUp/PgDn", "Scroll a page"),
    ("g / G", "Top / bottom"),
    ("? / Tab", "Toggle this help"),
];

pub fn draw_help(area: Rect, f: &mut Frame) {
    let key_style = Style::default().fg(Color::Magenta);
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYS.iter().map(|(key, what)| {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{key:<11}"), key_style),
            Span::raw(*what),
        ])
    }));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{:<11}", "q / Ctrl-C"), key_style),
        Span::raw("Quit"),
    ]));

    let popup = centered(area, 60, lines.len() as u16 + 2);
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help")),
        popup,
    );
}

/// A `width` x `height` rect centered in `area`, shrunk to fit.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}
