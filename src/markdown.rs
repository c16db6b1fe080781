//! Markdown rendering for AI-authored text.
//!
//! Output is embedded into HTML documents, so raw HTML from the source is
//! escaped unless it is one of a few harmless inline tags, and links with
//! script-capable schemes are neutralized.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};

/// Inline tags the report prompt asks the model to use.
const ALLOWED_INLINE_HTML: [&str; 5] = ["<u>", "</u>", "<br>", "<br/>", "<br />"];

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

pub fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Render markdown to sanitized HTML. Soft line breaks become `<br />`.
pub fn to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options()).map(sanitize_event);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut out, parser);
    out
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::SoftBreak => Event::HardBreak,
        Event::InlineHtml(html) if is_allowed_tag(&html) => Event::InlineHtml(html),
        // Text events are escaped by the HTML writer.
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn is_allowed_tag(html: &str) -> bool {
    let tag = html.trim().to_ascii_lowercase();
    ALLOWED_INLINE_HTML.contains(&tag.as_str())
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|s| normalized.starts_with(s)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
