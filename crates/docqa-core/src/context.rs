//! Bounded prompt context with citation markers.
//!
//! [`assemble`] picks retrieved spans in descending relevance order while
//! their cumulative size fits the budget. Spans are never split: one that
//! does not fit is skipped and smaller, lower-ranked spans are still
//! considered. Each included span becomes a [`ContextBlock`] tagged with a
//! marker of the form `[doc:<document_id>:<start>-<end>]`, which the
//! generator is asked to reuse when attributing claims.

use serde::{Deserialize, Serialize};

use crate::models::{Citation, RetrievedSpan};
use crate::retrieve::by_relevance;

/// One span of evidence in the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub marker: String,
    pub citation: Citation,
    pub chunk_id: String,
    pub title: String,
    pub text: String,
    pub score: f32,
}

/// Ordered evidence handed to the answer generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub blocks: Vec<ContextBlock>,
    /// Total size of the included spans, in chars.
    pub size: usize,
    pub max_size: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, marker: &str) -> Option<&ContextBlock> {
        self.blocks.iter().find(|b| b.marker == marker)
    }

    /// Render the blocks as prompt text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            out.push_str(&block.marker);
            if !block.title.is_empty() {
                out.push_str(" (");
                out.push_str(&block.title);
                out.push(')');
            }
            out.push('\n');
            out.push_str(block.text.trim_end());
            out.push_str("\n\n");
        }
        out
    }
}

/// Greedily fit `spans` into `max_context_size` chars.
///
/// Returns an empty context when nothing fits; the caller must then answer
/// "cannot answer" rather than generate without evidence.
pub fn assemble(spans: &[RetrievedSpan], max_context_size: usize) -> AssembledContext {
    let mut ordered: Vec<&RetrievedSpan> = spans.iter().collect();
    ordered.sort_by(|a, b| by_relevance(a, b));

    let mut context = AssembledContext {
        max_size: max_context_size,
        ..AssembledContext::default()
    };

    for span in ordered {
        let size = span.len();
        if context.size + size > max_context_size {
            continue;
        }
        let citation = Citation {
            document_id: span.document_id.clone(),
            start: span.start,
            end: span.end,
        };
        let marker = citation.marker();
        if context.block(&marker).is_some() {
            continue;
        }
        context.size += size;
        context.blocks.push(ContextBlock {
            marker,
            citation,
            chunk_id: span.chunk_id.clone(),
            title: span.title.clone(),
            text: span.text.clone(),
            score: span.score,
        });
    }

    context
}

/// Prompt section headings, in order.
pub const SOURCES_HEADING: &str = "## Sources";
pub const CONVERSATION_HEADING: &str = "## Conversation so far";
pub const QUESTION_HEADING: &str = "## Question";
pub const ANSWER_HEADING: &str = "## Answer";

const INSTRUCTIONS: &str = "Answer the question using only the sources below. \
After every claim, cite the source it comes from by copying its marker exactly, \
for example [doc:report:0-120]. Do not invent markers. \
If the sources do not contain the answer, say that you cannot answer.";

/// Build the full generation prompt.
pub fn build_prompt(
    question: &str,
    context: &AssembledContext,
    conversation: Option<&str>,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n");
    prompt.push_str(SOURCES_HEADING);
    prompt.push_str("\n\n");
    prompt.push_str(&context.render());
    if let Some(history) = conversation.map(str::trim).filter(|h| !h.is_empty()) {
        prompt.push_str(CONVERSATION_HEADING);
        prompt.push_str("\n\n");
        prompt.push_str(history);
        prompt.push_str("\n\n");
    }
    prompt.push_str(QUESTION_HEADING);
    prompt.push_str("\n\n");
    prompt.push_str(question.trim());
    prompt.push_str("\n\n");
    prompt.push_str(ANSWER_HEADING);
    prompt.push('\n');
    prompt
}
