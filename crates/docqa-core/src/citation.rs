//! Post-generation citation checking.
//!
//! Generated answers attribute claims with markers copied from the
//! assembled context. Any marker that does not name a block of that
//! context is a hallucinated citation: it is logged and stripped from the
//! text, never surfaced as an error.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::context::AssembledContext;
use crate::error::QaError;
use crate::models::Citation;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[doc:([^\[\]\s]+):(\d+)-(\d+)\]").unwrap());

/// Answer text after citation checking.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedAnswer {
    pub text: String,
    /// Valid citations in order of first appearance, without duplicates.
    pub citations: Vec<Citation>,
    /// Markers removed because they were not in the context.
    pub stripped: Vec<String>,
    /// Highest score among the cited blocks, `0.0` when nothing is cited.
    pub confidence: f32,
}

/// Validate every marker in `text` against `context`.
pub fn check_citations(text: &str, context: &AssembledContext) -> CheckedAnswer {
    let mut out = String::with_capacity(text.len());
    let mut citations = Vec::new();
    let mut seen = HashSet::new();
    let mut stripped = Vec::new();
    let mut confidence = 0.0f32;
    let mut last = 0;

    for m in MARKER.find_iter(text) {
        let marker = m.as_str();
        match context.block(marker) {
            Some(block) => {
                out.push_str(&text[last..m.end()]);
                if seen.insert(marker.to_string()) {
                    citations.push(block.citation.clone());
                }
                confidence = confidence.max(block.score);
            }
            None => {
                let before = &text[last..m.start()];
                // Drop the space that separated the marker from the claim.
                out.push_str(before.strip_suffix(' ').unwrap_or(before));
                warn!(
                    marker,
                    error = %QaError::HallucinatedCitation(marker.to_string()),
                    "stripping citation not present in context"
                );
                stripped.push(marker.to_string());
            }
        }
        last = m.end();
    }
    out.push_str(&text[last..]);

    CheckedAnswer {
        text: out.trim().to_string(),
        citations,
        stripped,
        confidence,
    }
}

/// Parse a marker back into a citation, if it is well formed.
pub fn parse_marker(marker: &str) -> Option<Citation> {
    let caps = MARKER.captures(marker)?;
    if caps.get(0)?.as_str() != marker {
        return None;
    }
    let start = caps[2].parse().ok()?;
    let end = caps[3].parse().ok()?;
    if end < start {
        return None;
    }
    Some(Citation {
        document_id: caps[1].to_string(),
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::assemble;
    use crate::models::RetrievedSpan;

    fn context() -> AssembledContext {
        let spans = vec![
            RetrievedSpan {
                chunk_id: "c1".into(),
                document_id: "policy".into(),
                title: "Policy".into(),
                text: "Refunds within 30 days.".into(),
                start: 0,
                end: 23,
                score: 0.8,
                rank: 1,
            },
            RetrievedSpan {
                chunk_id: "c2".into(),
                document_id: "faq".into(),
                title: "FAQ".into(),
                text: "Shipping is free.".into(),
                start: 100,
                end: 117,
                score: 0.6,
                rank: 2,
            },
        ];
        assemble(&spans, 1000)
    }

    #[test]
    fn test_valid_citations_kept_in_order() {
        let text = "Shipping is free [doc:faq:100-117]. Refunds take 30 days [doc:policy:0-23] [doc:faq:100-117].";
        let checked = check_citations(text, &context());
        assert_eq!(checked.text, text);
        assert!(checked.stripped.is_empty());
        let ids: Vec<&str> = checked.citations.iter().map(|c| c.document_id.as_str()).collect();
        assert_eq!(ids, vec!["faq", "policy"]);
        assert!((checked.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_hallucinated_citation_is_stripped() {
        let text = "Refunds take 30 days [doc:policy:0-23]. Returns need a receipt [doc:manual:5-50].";
        let checked = check_citations(text, &context());
        assert_eq!(
            checked.text,
            "Refunds take 30 days [doc:policy:0-23]. Returns need a receipt."
        );
        assert_eq!(checked.stripped, vec!["[doc:manual:5-50]".to_string()]);
        assert_eq!(checked.citations.len(), 1);
    }

    #[test]
    fn test_known_document_with_wrong_offsets_is_stripped() {
        let checked = check_citations("Free shipping [doc:faq:0-17]", &context());
        assert_eq!(checked.text, "Free shipping");
        assert!(checked.citations.is_empty());
        assert_eq!(checked.confidence, 0.0);
    }

    #[test]
    fn test_text_without_markers_is_unchanged() {
        let checked = check_citations("  No sources needed.  ", &context());
        assert_eq!(checked.text, "No sources needed.");
        assert!(checked.citations.is_empty());
    }

    #[test]
    fn test_parse_marker() {
        let c = parse_marker("[doc:notes/a:b.md:10-20]").unwrap();
        assert_eq!(c.document_id, "notes/a:b.md");
        assert_eq!((c.start, c.end), (10, 20));
        assert!(parse_marker("[doc:x:20-10]").is_none());
        assert!(parse_marker("see [doc:x:1-2]").is_none());
        assert!(parse_marker("[doc:x:1-]").is_none());
    }
}
