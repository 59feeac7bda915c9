//! `docqa ask`: answer one question from the indexed documents.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use docqa_core::models::Answer;
use docqa_core::orchestrator::QaOrchestrator;

/// Ask `question` and print the answer with its sources.
///
/// Fallback answers are printed like any other answer; the command only
/// fails on output errors.
pub async fn run_ask(
    qa: Arc<QaOrchestrator>,
    question: &str,
    conversation: Option<&str>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<Answer> {
    let answer = qa
        .ask(question, conversation, timeout_ms.map(Duration::from_millis))
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(answer);
    }

    println!("{}", answer.text);
    println!();
    if let Some(reason) = &answer.fallback {
        println!("(no grounded answer: {})", serde_json::to_string(reason)?);
        return Ok(answer);
    }

    println!("--- Sources ({}) ---", answer.citations.len());
    for citation in &answer.citations {
        let title = answer
            .context
            .as_ref()
            .and_then(|c| c.block(&citation.marker()))
            .map(|b| b.title.as_str())
            .unwrap_or("");
        println!(
            "{}  {}  chars {}..{}",
            citation.marker(),
            title,
            citation.start,
            citation.end
        );
    }
    println!("confidence: {:.3}", answer.confidence);
    Ok(answer)
}
