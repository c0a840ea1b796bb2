//! Markdown extraction: front matter, title precedence, markup stripping.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use serde_json::{json, Map};

use super::{collapse_whitespace, ExtractedFields};

/// Extracts a markdown document. Title precedence: front-matter `title`,
/// then the first level-one heading, then the caller's filename fallback.
pub fn extract(text: &str) -> ExtractedFields {
    let (front_matter, body) = split_front_matter(text);

    let mut metadata = Map::new();
    let mut title = None;
    let mut tags = Vec::new();

    if let Some(raw) = front_matter {
        if let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(raw) {
            if let Some(mapping) = value.as_mapping() {
                title = mapping
                    .get("title")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                tags = front_matter_tags(mapping);
            }
            if let Ok(as_json) = serde_json::to_value(&value) {
                metadata.insert("front_matter".to_string(), as_json);
            }
        }
    }

    let rendered = render_plain(body);
    if title.is_none() {
        title = rendered.first_h1.clone();
    }
    if !rendered.headings.is_empty() {
        metadata.insert("headings".to_string(), json!(rendered.headings));
    }

    ExtractedFields {
        title,
        content: collapse_whitespace(&rendered.text),
        metadata,
        tags,
    }
}

/// Splits a leading `---` delimited front-matter block from the body.
/// Returns `(front_matter, body)`; front matter is `None` when the block
/// is absent or unterminated.
fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let rest = match text.strip_prefix("---") {
        Some(r) if r.starts_with('\n') || r.starts_with("\r\n") => r,
        _ => return (None, text),
    };

    for (offset, line) in line_spans(rest) {
        if line.trim_end() == "---" {
            let body_start = offset + line.len();
            return (Some(&rest[..offset]), &rest[body_start..]);
        }
    }

    (None, text)
}

/// Yields `(byte_offset, line_including_newline)` pairs.
fn line_spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    std::iter::from_fn(move || {
        if offset >= text.len() {
            return None;
        }
        let rest = &text[offset..];
        let end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let span = (offset, &rest[..end]);
        offset += end;
        Some(span)
    })
}

/// Tags come from front-matter `tags` or `keywords`, either a sequence of
/// strings or a comma-separated string.
fn front_matter_tags(mapping: &serde_yaml::Mapping) -> Vec<String> {
    for key in ["tags", "keywords"] {
        let Some(value) = mapping.get(key) else {
            continue;
        };
        match value {
            serde_yaml::Value::Sequence(seq) => {
                return seq
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect();
            }
            serde_yaml::Value::String(s) => {
                return s
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

struct Rendered {
    text: String,
    headings: Vec<String>,
    first_h1: Option<String>,
}

/// Renders markdown to plain text, recording heading texts along the way.
/// Inline code and code block contents are kept; dropping them would
/// make common documentation unsearchable.
fn render_plain(body: &str) -> Rendered {
    let mut text = String::new();
    let mut headings = Vec::new();
    let mut first_h1 = None;

    let mut heading_buf: Option<(HeadingLevel, String)> = None;

    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::Heading(level, ..)) => {
                heading_buf = Some((level, String::new()));
            }
            Event::End(Tag::Heading(..)) => {
                if let Some((level, buf)) = heading_buf.take() {
                    let heading = collapse_whitespace(&buf);
                    if !heading.is_empty() {
                        if level == HeadingLevel::H1 && first_h1.is_none() {
                            first_h1 = Some(heading.clone());
                        }
                        headings.push(heading);
                    }
                }
                text.push(' ');
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some((_, buf)) = heading_buf.as_mut() {
                    buf.push_str(&t);
                }
                text.push_str(&t);
                text.push(' ');
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(Tag::Paragraph) | Event::End(Tag::Item) => text.push(' '),
            _ => {}
        }
    }

    Rendered {
        text,
        headings,
        first_h1,
    }
}
