//! Markdown to styled terminal lines, and width-aware wrapping.

use crate::markdown;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthChar;

use super::theme;

const RULE_WIDTH: usize = 24;

/// Convert markdown into lines ready for [`wrap`].
pub fn markdown_lines(source: &str) -> Vec<Line<'static>> {
    let mut w = LineWriter::default();
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut in_code_block = false;

    for event in Parser::new_ext(source, markdown::options()) {
        match event {
            Event::Start(tag) => match tag {
                Tag::Paragraph => {}
                Tag::Heading { level, .. } => {
                    w.flush();
                    let style = if matches!(level, HeadingLevel::H1 | HeadingLevel::H2) {
                        theme::heading()
                    } else {
                        Style::default().add_modifier(Modifier::BOLD)
                    };
                    w.push_style(style);
                }
                Tag::BlockQuote(_) => {
                    w.flush();
                    w.prefix.push_str("│ ");
                    w.push_style(theme::muted());
                }
                Tag::CodeBlock(_) => {
                    w.flush();
                    in_code_block = true;
                    w.push_style(theme::code());
                }
                Tag::List(start) => {
                    w.flush();
                    lists.push(start);
                }
                Tag::Item => {
                    w.flush();
                    let depth = lists.len().saturating_sub(1);
                    let bullet = match lists.last_mut() {
                        Some(Some(n)) => {
                            let b = format!("{n}. ");
                            *n += 1;
                            b
                        }
                        _ => "• ".to_string(),
                    };
                    w.push_raw(format!("{}{}", "  ".repeat(depth), bullet), theme::accent());
                }
                Tag::Emphasis => w.push_modifier(Modifier::ITALIC),
                Tag::Strong => w.push_modifier(Modifier::BOLD),
                Tag::Strikethrough => w.push_modifier(Modifier::CROSSED_OUT),
                Tag::Link { .. } => w.push_modifier(Modifier::UNDERLINED),
                Tag::TableRow | Tag::TableHead => w.flush(),
                _ => {}
            },
            Event::End(tag) => match tag {
                TagEnd::Paragraph => w.end_block(),
                TagEnd::Heading(_) => {
                    w.pop_style();
                    w.end_block();
                }
                TagEnd::BlockQuote(_) => {
                    w.pop_style();
                    w.flush();
                    let keep = w.prefix.len().saturating_sub("│ ".len());
                    w.prefix.truncate(keep);
                    w.end_block();
                }
                TagEnd::CodeBlock => {
                    in_code_block = false;
                    w.pop_style();
                    w.end_block();
                }
                TagEnd::List(_) => {
                    lists.pop();
                    if lists.is_empty() {
                        w.end_block();
                    }
                }
                TagEnd::Item => w.flush(),
                TagEnd::Emphasis
                | TagEnd::Strong
                | TagEnd::Strikethrough
                | TagEnd::Link => w.pop_style(),
                TagEnd::TableCell => w.push_raw(" │ ".into(), theme::muted()),
                TagEnd::TableHead | TagEnd::TableRow => w.flush(),
                TagEnd::Table => w.end_block(),
                _ => {}
            },
            Event::Text(text) if in_code_block => {
                let mut parts = text.split('\n').peekable();
                while let Some(part) = parts.next() {
                    w.push_text(part);
                    if parts.peek().is_some() {
                        w.flush_forced();
                    }
                }
            }
            Event::Text(text) => w.push_text(&text),
            Event::Code(code) => w.push_raw(code.to_string(), theme::code()),
            Event::SoftBreak | Event::HardBreak => w.flush_forced(),
            Event::Rule => {
                w.flush();
                w.push_raw("─".repeat(RULE_WIDTH), theme::muted());
                w.end_block();
            }
            Event::TaskListMarker(done) => {
                w.push_raw(if done { "[x] " } else { "[ ] " }.into(), theme::muted())
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                match html.trim().to_ascii_lowercase().as_str() {
                    "<u>" => w.push_modifier(Modifier::UNDERLINED),
                    "</u>" => w.pop_style(),
                    "<br>" | "<br/>" | "<br />" => w.flush_forced(),
                    _ => w.push_text(html.trim_end_matches('\n')),
                }
            }
            _ => {}
        }
    }
    w.flush();
    w.finish()
}

#[derive(Default)]
struct LineWriter {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    prefix: String,
}

impl LineWriter {
    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn push_style(&mut self, style: Style) {
        self.styles.push(style);
    }

    fn push_modifier(&mut self, m: Modifier) {
        self.styles.push(Style::default().add_modifier(m));
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn start_line(&mut self) {
        if self.spans.is_empty() && !self.prefix.is_empty() {
            self.spans
                .push(Span::styled(self.prefix.clone(), theme::muted()));
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.start_line();
        let style = self.style();
        self.spans.push(Span::styled(text.to_string(), style));
    }

    fn push_raw(&mut self, text: String, style: Style) {
        self.start_line();
        self.spans.push(Span::styled(text, style));
    }

    fn flush(&mut self) {
        if !self.spans.is_empty() {
            self.flush_forced();
        }
    }

    fn flush_forced(&mut self) {
        let spans = std::mem::take(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    /// Close a block with exactly one blank separator line.
    fn end_block(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Wrap lines to `width` columns, breaking at spaces where possible.
pub fn wrap(lines: &[Line<'_>], width: u16) -> Vec<Line<'static>> {
    let width = usize::from(width.max(1));
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let cells: Vec<(char, Style)> = line
            .spans
            .iter()
            .flat_map(|span| {
                let style = line.style.patch(span.style);
                span.content.chars().map(move |c| (c, style))
            })
            .filter(|(c, _)| !c.is_control())
            .collect();
        if cells.is_empty() {
            out.push(Line::default());
            continue;
        }
        wrap_cells(&cells, width, &mut out);
    }
    out
}

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

fn wrap_cells(cells: &[(char, Style)], width: usize, out: &mut Vec<Line<'static>>) {
    let mut row: Vec<(char, Style)> = Vec::new();
    let mut row_width = 0;
    let mut last_space: Option<usize> = None;

    for &(c, style) in cells {
        let w = char_width(c);
        if row_width + w > width && !row.is_empty() {
            if c == ' ' {
                out.push(to_line(&row));
                row.clear();
                row_width = 0;
                last_space = None;
                continue;
            }
            match last_space {
                Some(at) if at > 0 => {
                    let carry: Vec<_> = row.split_off(at + 1);
                    row.pop();
                    out.push(to_line(&row));
                    row = carry;
                }
                _ => {
                    out.push(to_line(&row));
                    row.clear();
                }
            }
            row_width = row.iter().map(|(c, _)| char_width(*c)).sum();
            last_space = None;
        }
        if c == ' ' {
            last_space = Some(row.len());
        }
        row.push((c, style));
        row_width += w;
    }
    if !row.is_empty() {
        out.push(to_line(&row));
    }
}

fn to_line(cells: &[(char, Style)]) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    let mut current_style: Option<Style> = None;
    for &(c, style) in cells {
        if current_style.is_some_and(|s| s != style) {
            spans.push(Span::styled(
                std::mem::take(&mut current),
                current_style.unwrap_or_default(),
            ));
        }
        current_style = Some(style);
        current.push(c);
    }
    if !current.is_empty() {
        spans.push(Span::styled(current, current_style.unwrap_or_default()));
    }
    Line::from(spans)
}

/// Display width of a string in terminal columns.
pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Cut `s` to at most `max` columns, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if display_width(s) <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = char_width(c);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn headings_paragraphs_and_lists() {
        let lines = markdown_lines("# Title\n\nSome **bold** text.\n\n- one\n- two\n\n1. first\n2. second");
        assert_eq!(
            plain(&lines),
            [
                "Title",
                "",
                "Some bold text.",
                "",
                "• one",
                "• two",
                "",
                "1. first",
                "2. second",
            ]
        );
        let bold = lines[2]
            .spans
            .iter()
            .find(|s| s.content == "bold")
            .unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn soft_breaks_split_lines() {
        let lines = markdown_lines("alpha\nbeta");
        assert_eq!(plain(&lines), ["alpha", "beta"]);
    }

    #[test]
    fn underline_tags_style_text() {
        let lines = markdown_lines("a <u>key</u> point");
        let key = lines[0].spans.iter().find(|s| s.content == "key").unwrap();
        assert!(key.style.add_modifier.contains(Modifier::UNDERLINED));
        assert_eq!(plain(&lines), ["a key point"]);
    }

    #[test]
    fn wrap_prefers_spaces() {
        let lines = [Line::from("the quick brown fox jumps")];
        assert_eq!(plain(&wrap(&lines, 10)), ["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn wrap_hard_breaks_long_words() {
        let lines = [Line::from("abcdefghij")];
        assert_eq!(plain(&wrap(&lines, 4)), ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_counts_wide_characters() {
        let lines = [Line::from("売上高売上高")];
        assert_eq!(plain(&wrap(&lines, 6)), ["売上高", "売上高"]);
    }

    #[test]
    fn truncate_marks_the_cut() {
        assert_eq!(truncate("Monthly trend", 8), "Monthly…");
        assert_eq!(truncate("short", 8), "short");
    }
}
