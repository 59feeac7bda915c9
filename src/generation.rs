//! Answer generator implementations.
//!
//! - **[`ExtractiveGenerator`]**: offline; quotes the source sentences that
//!   best overlap the question, each followed by its marker.
//! - **[`OpenAIGenerator`]**: `POST {url}/chat/completions`.
//! - **[`OllamaGenerator`]**: `POST {url}/api/generate` with `stream: false`.
//!
//! Error classification matches [`crate::embedding`]: 429/5xx/network
//! failures are retryable, other 4xx responses are configuration errors.

use anyhow::bail;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use docqa_core::capability::AnswerGenerator;
use docqa_core::citation::parse_marker;
use docqa_core::context::{ANSWER_HEADING, CONVERSATION_HEADING, QUESTION_HEADING, SOURCES_HEADING};
use docqa_core::{QaError, Result};

use crate::config::GenerationConfig;
use crate::embedding::post_json;

const CAPABILITY: &str = "generator";

/// Sentences quoted per answer.
const MAX_SENTENCES: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "when", "where", "which", "who", "how",
    "why", "does", "did", "can", "with", "from", "that", "this", "there", "their", "about",
    "into", "has", "have", "had", "its", "you", "your", "our", "not", "but", "any", "all",
];

// ============ Extractive Generator ============

/// Answers by quoting the prompt's own sources.
///
/// Parses the blocks between the sources and question headings, scores
/// each sentence by how many question terms it contains, and returns the
/// best few sentences with their markers. Produces a cannot-answer reply
/// when no sentence shares a term with the question.
pub struct ExtractiveGenerator;

#[derive(Debug, PartialEq)]
struct SourceBlock {
    marker: String,
    text: String,
}

fn section<'a>(prompt: &'a str, heading: &str) -> Option<&'a str> {
    let start = prompt.find(&format!("\n{heading}\n"))? + heading.len() + 2;
    Some(&prompt[start..])
}

fn parse_sources(prompt: &str) -> Vec<SourceBlock> {
    let Some(sources) = section(prompt, SOURCES_HEADING) else {
        return Vec::new();
    };
    let end = [CONVERSATION_HEADING, QUESTION_HEADING]
        .iter()
        .filter_map(|h| sources.find(&format!("\n{h}\n")))
        .min()
        .unwrap_or(sources.len());

    let mut blocks: Vec<SourceBlock> = Vec::new();
    for line in sources[..end].lines() {
        let marker = line
            .find(']')
            .map(|i| &line[..=i])
            .filter(|m| m.starts_with("[doc:") && parse_marker(m).is_some());
        match (marker, blocks.last_mut()) {
            (Some(marker), _) => blocks.push(SourceBlock {
                marker: marker.to_string(),
                text: String::new(),
            }),
            (None, Some(block)) => {
                if !block.text.is_empty() {
                    block.text.push('\n');
                }
                block.text.push_str(line);
            }
            (None, None) => {}
        }
    }
    blocks
}

fn parse_question(prompt: &str) -> &str {
    let Some(start) = prompt.rfind(&format!("\n{QUESTION_HEADING}\n")) else {
        return "";
    };
    let rest = &prompt[start + QUESTION_HEADING.len() + 2..];
    let end = rest
        .find(&format!("\n{ANSWER_HEADING}"))
        .unwrap_or(rest.len());
    rest[..end].trim()
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if at_boundary || c == '\n' {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if sentence.chars().any(char::is_alphanumeric) {
                out.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if tail.chars().any(char::is_alphanumeric) {
        out.push(tail);
    }
    out
}

impl ExtractiveGenerator {
    pub fn answer(prompt: &str) -> String {
        let question = terms(parse_question(prompt));
        let blocks = parse_sources(prompt);

        // (score, block order, sentence order, sentence, marker)
        let mut scored: Vec<(usize, usize, usize, &str, &str)> = Vec::new();
        for (b, block) in blocks.iter().enumerate() {
            for (s, sentence) in sentences(&block.text).into_iter().enumerate() {
                let score = terms(sentence).intersection(&question).count();
                if score > 0 {
                    scored.push((score, b, s, sentence, block.marker.as_str()));
                }
            }
        }

        if scored.is_empty() {
            return "I cannot answer that from the provided sources.".to_string();
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        scored.truncate(MAX_SENTENCES);
        // Keep source order for readability.
        scored.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        scored
            .iter()
            .map(|(_, _, _, sentence, marker)| format!("{sentence} {marker}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(Self::answer(prompt))
    }
}

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn invalid_response(message: &str) -> QaError {
    QaError::Capability {
        capability: CAPABILITY,
        message: format!("invalid response: {message}"),
    }
}

// ============ OpenAI Generator ============

/// Generator using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url,
            api_key,
            model,
            temperature: config.temperature,
        })
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid_response("missing choices[0].message.content"))
}

#[async_trait]
impl AnswerGenerator for OpenAIGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let request = self
            .client
            .post(format!("{}/chat/completions", self.url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key));
        let json = post_json(CAPABILITY, request, &body).await?;
        parse_chat_response(&json)
    }
}

// ============ Ollama Generator ============

/// Generator using a local Ollama instance.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url,
            model,
            temperature: config.temperature,
        })
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid_response("missing response field"))
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let request = self
            .client
            .post(format!("{}/api/generate", self.url.trim_end_matches('/')));
        let json = post_json(CAPABILITY, request, &body).await?;
        parse_ollama_response(&json)
    }
}

/// Create the [`AnswerGenerator`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn AnswerGenerator>> {
    match config.provider.as_str() {
        "extractive" => Ok(Arc::new(ExtractiveGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::citation::check_citations;
    use docqa_core::context::{assemble, build_prompt};
    use docqa_core::models::RetrievedSpan;

    fn span(doc: &str, text: &str, start: usize, score: f32) -> RetrievedSpan {
        RetrievedSpan {
            chunk_id: format!("{doc}-{start}"),
            document_id: doc.to_string(),
            title: doc.to_uppercase(),
            text: text.to_string(),
            start,
            end: start + text.chars().count(),
            score,
            rank: 1,
        }
    }

    #[test]
    fn test_extractive_quotes_matching_sentence_with_marker() {
        let context = assemble(
            &[
                span("refunds", "Refunds are issued within 30 days. Shipping is free.", 0, 0.9),
                span("hours", "The office opens at nine.", 0, 0.5),
            ],
            1000,
        );
        let prompt = build_prompt("How fast are refunds issued?", &context, None);
        let answer = ExtractiveGenerator::answer(&prompt);
        assert_eq!(answer, "Refunds are issued within 30 days. [doc:refunds:0-52]");

        let checked = check_citations(&answer, &context);
        assert!(checked.stripped.is_empty());
        assert_eq!(checked.citations.len(), 1);
    }

    #[test]
    fn test_extractive_cannot_answer_without_overlap() {
        let context = assemble(&[span("hours", "The office opens at nine.", 0, 0.5)], 1000);
        let prompt = build_prompt("Who won the match?", &context, None);
        let answer = ExtractiveGenerator::answer(&prompt);
        assert!(answer.starts_with("I cannot answer"));
    }

    #[test]
    fn test_extractive_ignores_conversation_text() {
        let context = assemble(&[span("hours", "The office opens at nine.", 0, 0.5)], 1000);
        let prompt = build_prompt(
            "When does the office open?",
            &context,
            Some("user: [doc:fake:0-1] office office office"),
        );
        let answer = ExtractiveGenerator::answer(&prompt);
        assert_eq!(answer, "The office opens at nine. [doc:hours:0-25]");
    }

    #[test]
    fn test_sentences_split_on_terminal_punctuation() {
        assert_eq!(
            sentences("Version 2.5 shipped. Did it work? Yes!"),
            vec!["Version 2.5 shipped.", "Did it work?", "Yes!"]
        );
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Thirty days." } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Thirty days.");
        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_generate_response() {
        let json = serde_json::json!({ "response": "Nine.", "done": true });
        assert_eq!(parse_ollama_response(&json).unwrap(), "Nine.");
    }

    #[test]
    fn test_create_generator_defaults_to_extractive() {
        let generator = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(generator.name(), "extractive");
    }
}
