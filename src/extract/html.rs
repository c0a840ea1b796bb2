//! HTML extraction: script/style stripping, title precedence, meta capture.

use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};

use super::{collapse_whitespace, ExtractedFields};

/// Extracts an HTML document. Title precedence: `<title>`, then the first
/// `<h1>`, then empty (the caller's filename fallback applies).
pub fn extract(raw: &str) -> ExtractedFields {
    let document = Html::parse_document(raw);

    let title = select_first_text(&document, "title")
        .or_else(|| select_first_text(&document, "h1"));

    // Content is the body's rendered text; head-only text like <title>
    // stays out of it.
    let mut body = String::new();
    collect_text(body_element(&document), &mut body);

    let mut metadata = Map::new();
    let meta_pairs = collect_meta(&document);
    if !meta_pairs.is_empty() {
        metadata.insert("meta".to_string(), Value::Object(meta_pairs.clone()));
    }

    let headings = collect_all(&document, "h1, h2, h3, h4, h5, h6");
    if !headings.is_empty() {
        metadata.insert("headings".to_string(), json!(headings));
    }

    let links = collect_links(&document);
    if !links.is_empty() {
        metadata.insert("links".to_string(), json!(links));
    }

    let tags = meta_pairs
        .get("keywords")
        .and_then(|v| v.as_str())
        .map(|kw| {
            kw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ExtractedFields {
        title,
        content: collapse_whitespace(&body),
        metadata,
        tags,
    }
}

fn body_element(document: &Html) -> ElementRef {
    Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element())
}

fn select_first_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn collect_all(document: &Html, selector: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// `<meta>` name/property/http-equiv → content pairs.
fn collect_meta(document: &Html) -> Map<String, Value> {
    let mut pairs = Map::new();
    let Ok(sel) = Selector::parse("meta") else {
        return pairs;
    };
    for el in document.select(&sel) {
        let key = el
            .value()
            .attr("name")
            .or_else(|| el.value().attr("property"))
            .or_else(|| el.value().attr("http-equiv"));
        if let (Some(key), Some(content)) = (key, el.value().attr("content")) {
            pairs.insert(key.to_string(), json!(content));
        }
    }
    pairs
}

fn collect_links(document: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Walks the tree collecting text nodes, skipping script and style
/// subtrees entirely.
fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            scraper::Node::Element(el) => {
                if matches!(el.name(), "script" | "style") {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}
