//! In-memory fuzzy search over the document collection.
//!
//! The index is a private, rebuildable snapshot of the store. Before
//! serving a query it compares the store's `last_updated` stat against
//! its own build time and rebuilds in full when stale, acceptable while
//! document counts stay in the low thousands. It never mutates the
//! store.
//!
//! Matching is multi-field and weighted: title 0.4, content 0.3, tags
//! 0.2, filename 0.1. Per-field distances combine multiplicatively with
//! the weight as exponent, so a strong match on a heavy field dominates.
//! The reported score is `1 - distance`: 1.0 is a perfect match, 0.0 the
//! weakest accepted match at the given threshold.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Document, Highlight, SearchHit, SearchOptions};
use crate::store::Store;

/// Default match tolerance: 0 = exact, 1 = match anything.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Query terms shorter than this are not considered.
const MIN_TERM_LEN: usize = 2;
/// Highlight window radius around a match span, in bytes.
const HIGHLIGHT_RADIUS: usize = 50;
/// Maximum highlights per result.
const MAX_HIGHLIGHTS: usize = 3;
/// Floor for a perfect per-field distance so the weighted product stays
/// meaningful.
const MIN_FIELD_DISTANCE: f64 = 0.001;

const FIELD_CONTENT: usize = 1;

const FIELD_NAMES: [&str; 4] = ["title", "content", "tags", "filename"];
const FIELD_WEIGHTS: [f64; 4] = [0.4, 0.3, 0.2, 0.1];

/// One indexed document: the document itself, its lowercased match
/// fields, and the original-case text snippets are cut from, prepared
/// once at build time.
struct IndexEntry {
    doc: Document,
    fields: [String; 4],
    display: [String; 4],
}

impl IndexEntry {
    fn new(doc: Document) -> Self {
        let filename = doc
            .metadata
            .get("filename")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let display = [
            doc.title.clone(),
            doc.content.clone(),
            doc.tags.join(" "),
            filename,
        ];
        let fields = [
            display[0].to_lowercase(),
            display[1].to_lowercase(),
            display[2].to_lowercase(),
            display[3].to_lowercase(),
        ];
        Self {
            doc,
            fields,
            display,
        }
    }

    /// Snippet source for a field: the original-case text when its byte
    /// layout matches the lowercased match copy (lowercasing can change
    /// byte lengths in some scripts), otherwise the match copy.
    fn snippet_source(&self, idx: usize) -> &str {
        if self.display[idx].len() == self.fields[idx].len() {
            &self.display[idx]
        } else {
            &self.fields[idx]
        }
    }
}

/// The tuned match engine. The index keeps one built for the default
/// threshold; a query with a non-default threshold gets its own,
/// differently-tuned instance for that query only.
#[derive(Clone, Copy)]
struct Matcher {
    tolerance: f64,
}

/// A field-level match: distance in [0, 1] (lower is better) and the
/// byte span of the best-matching region in the lowercased field.
struct FieldMatch {
    distance: f64,
    span: Option<(usize, usize)>,
}

impl Matcher {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.clamp(0.0, 1.0),
        }
    }

    /// Matches the query terms against one lowercased field. Returns
    /// `None` when no term comes within tolerance.
    fn match_field(&self, terms: &[String], phrase: &str, field: &str) -> Option<FieldMatch> {
        if field.is_empty() || terms.is_empty() {
            return None;
        }

        // Whole-phrase containment is a perfect match regardless of
        // tolerance.
        if let Some(pos) = field.find(phrase) {
            return Some(FieldMatch {
                distance: 0.0,
                span: Some((pos, pos + phrase.len())),
            });
        }

        let mut total = 0.0;
        let mut matched_any = false;
        let mut best_span: Option<(usize, usize)> = None;
        let mut best_term_distance = f64::INFINITY;

        for term in terms {
            let (distance, span) = best_term_match(term, field);
            if distance <= self.tolerance {
                matched_any = true;
                if distance < best_term_distance {
                    best_term_distance = distance;
                    best_span = span;
                }
            }
            // Unmatched terms still count against the field distance, so
            // covering more of the query ranks higher.
            total += distance.min(1.0);
        }

        if !matched_any {
            return None;
        }

        Some(FieldMatch {
            distance: total / terms.len() as f64,
            span: best_span,
        })
    }
}

/// Best match of a single term within a field: exact substring wins,
/// otherwise the closest whitespace token by Jaro-Winkler distance.
fn best_term_match(term: &str, field: &str) -> (f64, Option<(usize, usize)>) {
    if let Some(pos) = field.find(term) {
        return (0.0, Some((pos, pos + term.len())));
    }

    let mut best = (1.0, None);
    for (offset, token) in tokens_with_offsets(field) {
        let distance = 1.0 - strsim::jaro_winkler(term, token);
        if distance < best.0 {
            best = (distance, Some((offset, offset + token.len())));
        }
    }
    best
}

fn tokens_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_whitespace()
        .map(move |tok| (tok.as_ptr() as usize - text.as_ptr() as usize, tok))
}

pub struct SearchIndex {
    entries: Vec<IndexEntry>,
    built_at: Option<DateTime<Utc>>,
    matcher: Matcher,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            built_at: None,
            matcher: Matcher::new(DEFAULT_THRESHOLD),
        }
    }

    /// Rebuilds the snapshot from the store when it has grown stale:
    /// never built, documents newer than the last build, or a document
    /// count that no longer matches (cascade deletes shrink the
    /// collection without advancing `last_updated`).
    pub async fn refresh(&mut self, store: &Store) -> Result<()> {
        let stats = store.stats().await?;

        let stale = match self.built_at {
            None => true,
            Some(built) => {
                stats.last_updated.map(|u| u > built).unwrap_or(false)
                    || stats.total_documents as usize != self.entries.len()
            }
        };

        if stale {
            let documents = store.list_documents().await?;
            debug!(documents = documents.len(), "rebuilding search index");
            self.rebuild(documents);
        }

        Ok(())
    }

    /// Replaces the snapshot wholesale. Documents are expected in
    /// recency order (updated_at descending), as the store lists them.
    pub fn rebuild(&mut self, documents: Vec<Document>) {
        self.entries = documents.into_iter().map(IndexEntry::new).collect();
        self.built_at = Some(Utc::now());
    }

    /// Ranked fuzzy search. Post-match filters (sources, types, tags)
    /// apply after ranking; the ranked list is over-fetched at twice the
    /// requested limit so filters don't starve the result set.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let phrase = query.trim().to_lowercase();
        let terms: Vec<String> = phrase
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TERM_LEN)
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let matcher = match options.threshold {
            Some(t) if t != DEFAULT_THRESHOLD => Matcher::new(t),
            _ => self.matcher,
        };

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| self.score_entry(&matcher, &terms, &phrase, entry))
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.document.updated_at.cmp(&a.document.updated_at))
                .then(a.document.id.cmp(&b.document.id))
        });
        hits.truncate(options.limit.saturating_mul(2).max(options.limit));

        hits.retain(|hit| passes_options(&hit.document, options));
        hits.truncate(options.limit);
        hits
    }

    fn score_entry(
        &self,
        matcher: &Matcher,
        terms: &[String],
        phrase: &str,
        entry: &IndexEntry,
    ) -> Option<SearchHit> {
        let mut combined = 1.0;
        let mut matched = false;
        let mut highlights = Vec::new();

        for idx in 0..entry.fields.len() {
            let Some(field_match) = matcher.match_field(terms, phrase, &entry.fields[idx]) else {
                continue;
            };
            matched = true;
            let distance = field_match.distance.max(MIN_FIELD_DISTANCE);
            combined *= distance.powf(FIELD_WEIGHTS[idx]);

            if highlights.len() < MAX_HIGHLIGHTS {
                if let Some(span) = field_match.span {
                    highlights.push(Highlight {
                        field: FIELD_NAMES[idx].to_string(),
                        snippet: snippet_window(entry.snippet_source(idx), span),
                    });
                }
            }
        }

        if !matched {
            return None;
        }

        if highlights.is_empty() {
            if let Some(h) = fallback_highlight(
                &entry.fields[FIELD_CONTENT],
                entry.snippet_source(FIELD_CONTENT),
                terms,
            ) {
                highlights.push(h);
            }
        }

        Some(SearchHit {
            document: entry.doc.clone(),
            score: 1.0 - combined,
            highlights,
        })
    }

    /// Most recently updated documents.
    pub fn recent_documents(&self, limit: usize) -> Vec<Document> {
        let mut docs: Vec<Document> = self.entries.iter().map(|e| e.doc.clone()).collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        docs.truncate(limit);
        docs
    }

    /// Documents similar to the given one, ranked by a synthetic query
    /// built from its title and tags. The target itself is excluded.
    pub fn similar_documents(&self, document_id: &str, limit: usize) -> Vec<SearchHit> {
        let Some(target) = self
            .entries
            .iter()
            .find(|e| e.doc.id == document_id)
            .map(|e| &e.doc)
        else {
            return Vec::new();
        };

        let query = format!("{} {}", target.title, target.tags.join(" "));
        let options = SearchOptions {
            limit: limit + 1,
            ..Default::default()
        };

        let mut hits = self.search(&query, &options);
        hits.retain(|hit| hit.document.id != document_id);
        hits.truncate(limit);
        hits
    }

    pub fn documents_by_type(&self, doc_type: crate::models::DocumentType) -> Vec<Document> {
        self.entries
            .iter()
            .filter(|e| e.doc.doc_type == doc_type)
            .map(|e| e.doc.clone())
            .collect()
    }

    pub fn documents_by_source(&self, source_id: &str) -> Vec<Document> {
        self.entries
            .iter()
            .filter(|e| e.doc.source_id == source_id)
            .map(|e| e.doc.clone())
            .collect()
    }

    pub fn documents_by_tags(&self, tags: &[String]) -> Vec<Document> {
        self.entries
            .iter()
            .filter(|e| e.doc.tags.iter().any(|t| tags.contains(t)))
            .map(|e| e.doc.clone())
            .collect()
    }
}

fn passes_options(doc: &Document, options: &SearchOptions) -> bool {
    if !options.source_ids.is_empty() && !options.source_ids.contains(&doc.source_id) {
        return false;
    }
    if !options.types.is_empty() && !options.types.contains(&doc.doc_type) {
        return false;
    }
    if !options.tags.is_empty() && !doc.tags.iter().any(|t| options.tags.contains(t)) {
        return false;
    }
    true
}

/// Extracts a trimmed window around the match span, with ellipses on the
/// sides that don't reach the field boundary.
fn snippet_window(field: &str, span: (usize, usize)) -> String {
    let start = floor_char_boundary(field, span.0.saturating_sub(HIGHLIGHT_RADIUS));
    let end = ceil_char_boundary(field, (span.1 + HIGHLIGHT_RADIUS).min(field.len()));

    let mut snippet = field[start..end].trim().to_string();
    if start > 0 {
        snippet.insert_str(0, "...");
    }
    if end < field.len() {
        snippet.push_str("...");
    }
    snippet
}

/// When the match engine produced no spans, fall back to a linear scan of
/// the lowercased content for any query word; the snippet is cut from the
/// display text at the same span.
fn fallback_highlight(content: &str, display: &str, terms: &[String]) -> Option<Highlight> {
    for term in terms {
        if let Some(pos) = content.find(term.as_str()) {
            return Some(Highlight {
                field: "content".to_string(),
                snippet: snippet_window(display, (pos, pos + term.len())),
            });
        }
    }
    None
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
