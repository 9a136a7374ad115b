//! Inline markdown to Telegram HTML.
//!
//! Telegram accepts a small HTML subset (`b`, `i`, `s`, `code`, `pre`, `a`).
//! Notebook text and command results are rendered line by line with inline
//! markdown only: indentation is kept verbatim and block markers (headings,
//! list bullets, quotes, fences) are left as literal text.

use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

/// Markers that would turn a lone line into a block element.
static BLOCK_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:#{1,6}(?:\s+|$)|[-*+](?:\s+|$)|\d{1,9}[.)](?:\s+|$)|>\s*|<|`{3,}.*$|~{3,}.*$|(?:[-*_]\s*){3,}$|\[[^\]]*\]:\s*)")
        .expect("Invalid block marker regex")
});

/// Escape HTML special characters for Telegram HTML mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn attr_escape(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}

/// Render `text` as Telegram HTML, interpreting inline markdown only.
pub fn inline_html(text: &str) -> String {
    text.split('\n')
        .map(render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_line(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];

    // Markers can stack (`- - item`, `> 1. item`); all of them stay literal.
    let mut marker_len = 0;
    while let Some(m) = BLOCK_MARKER_REGEX.find(&trimmed[marker_len..]) {
        if m.end() == 0 {
            break;
        }
        marker_len += m.end();
    }
    let (marker, rest) = trimmed.split_at(marker_len);

    let mut out = String::with_capacity(line.len() + 16);
    out.push_str(indent);
    out.push_str(&html_escape(marker));
    out.push_str(&render_inline(rest));
    out
}

fn render_inline(fragment: &str) -> String {
    if fragment.is_empty() {
        return String::new();
    }

    let trailing = &fragment[fragment.trim_end().len()..];
    let parser = Parser::new_ext(fragment, Options::ENABLE_STRIKETHROUGH);

    let mut out = String::new();
    // Alt text of images is dropped; the link label is the image title.
    let mut image_depth = 0usize;

    for event in parser {
        match event {
            Event::Start(Tag::Image { dest_url, title, .. }) => {
                image_depth += 1;
                let label = if title.is_empty() {
                    "&#8288;".to_string()
                } else {
                    html_escape(&title)
                };
                out.push_str(&format!("<a href=\"{}\">{}</a>", attr_escape(&dest_url), label));
            }
            Event::End(TagEnd::Image) => {
                image_depth = image_depth.saturating_sub(1);
            }
            _ if image_depth > 0 => {}
            Event::Start(Tag::Emphasis) => out.push_str("<i>"),
            Event::End(TagEnd::Emphasis) => out.push_str("</i>"),
            Event::Start(Tag::Strong) => out.push_str("<b>"),
            Event::End(TagEnd::Strong) => out.push_str("</b>"),
            Event::Start(Tag::Strikethrough) => out.push_str("<s>"),
            Event::End(TagEnd::Strikethrough) => out.push_str("</s>"),
            Event::Start(Tag::Link { dest_url, .. }) => {
                out.push_str(&format!("<a href=\"{}\">", attr_escape(&dest_url)));
            }
            Event::End(TagEnd::Link) => out.push_str("</a>"),
            Event::Code(code) => {
                out.push_str("<code>");
                out.push_str(&html_escape(&code));
                out.push_str("</code>");
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                out.push_str(&html_escape(&text));
            }
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            _ => {}
        }
    }

    // The parser drops trailing whitespace of a paragraph.
    out.push_str(trailing);
    out
}
