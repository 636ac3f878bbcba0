//! Digest generation. Gathers unsummarized messages, condenses them through
//! the LLM port, and persists the result.
//!
//! Long inputs are split on paragraph boundaries, each chunk summarized
//! separately, and the partial summaries folded into one final pass.

use crate::domain::{DomainError, MEDIA_PLACEHOLDER, StoredMessage};
use crate::ports::{LlmPort, MessageStore};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Character budget per LLM request.
pub const CHUNK_BUDGET: usize = 30_000;

/// Result of a digest run over the store.
#[derive(Debug)]
pub enum DigestOutcome {
    /// Nothing pending.
    Empty,
    /// Pending messages exist but none carry text (media only).
    NoText,
    Generated {
        summary: String,
        message_count: usize,
    },
}

pub struct DigestService {
    llm: Arc<dyn LlmPort>,
    store: Arc<dyn MessageStore>,
}

impl DigestService {
    pub fn new(llm: Arc<dyn LlmPort>, store: Arc<dyn MessageStore>) -> Self {
        Self { llm, store }
    }

    /// Digest all unsummarized messages (optionally of one chat), persist the
    /// summary and mark the sources processed.
    pub async fn digest(&self, chat_id: Option<i64>) -> Result<DigestOutcome, DomainError> {
        let pending = self.store.unsummarized(chat_id).await?;
        if pending.is_empty() {
            return Ok(DigestOutcome::Empty);
        }

        let mut lines = Vec::new();
        let mut keys = Vec::new();
        for message in &pending {
            if message.text.trim().is_empty() || message.text == MEDIA_PLACEHOLDER {
                continue;
            }
            lines.push(format_message_line(message));
            keys.push((message.chat_id, message.id));
        }
        if lines.is_empty() {
            return Ok(DigestOutcome::NoText);
        }

        info!(
            chat_id = chat_id.unwrap_or_default(),
            messages = keys.len(),
            "generating digest"
        );
        let summary = self.summarize_text(&lines.join("\n\n")).await?;
        self.store.save_summary(chat_id, &summary, &keys).await?;

        Ok(DigestOutcome::Generated {
            summary,
            message_count: keys.len(),
        })
    }

    /// Summarize arbitrary text, chunking when it exceeds the request budget.
    pub async fn summarize_text(&self, text: &str) -> Result<String, DomainError> {
        if text.len() <= CHUNK_BUDGET {
            return Ok(self.llm.summarize(text).await?);
        }

        let chunks = split_chunks(text, CHUNK_BUDGET);
        info!(chunks = chunks.len(), "input over budget, summarizing in parts");
        let mut partials = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let partial = self.llm.summarize(chunk).await?;
            info!(part = i + 1, total = chunks.len(), "part summarized");
            partials.push(partial);
        }
        if partials.len() == 1 {
            return Ok(partials.remove(0));
        }

        let combined = partials
            .iter()
            .enumerate()
            .map(|(i, s)| format!("Часть {}:\n{}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n\n");
        // When the reduce pass fails, the joined partials are still a usable
        // digest; return them instead of failing the whole run.
        match self.llm.summarize(&combined).await {
            Ok(final_summary) => Ok(final_summary),
            Err(e) => {
                warn!(error = %e, "final reduce pass failed, returning joined parts");
                Ok(combined)
            }
        }
    }
}

/// Resolve the one-shot summarization input: inline text wins, otherwise the
/// file is read. Blank input is rejected up front.
pub async fn resolve_input(
    text: Option<String>,
    file: Option<PathBuf>,
) -> Result<String, DomainError> {
    let input = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DomainError::Storage(format!("read {}: {}", path.display(), e)))?,
        (None, None) => {
            return Err(DomainError::Config("pass --text or --file".into()));
        }
    };
    if input.trim().is_empty() {
        return Err(DomainError::Config(
            "input is empty, nothing to summarize".into(),
        ));
    }
    Ok(input)
}

/// One log line per message: `[2024-01-05 10:30:00] Alice: text`.
fn format_message_line(message: &StoredMessage) -> String {
    let when = DateTime::<Utc>::from_timestamp(message.date, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| message.date.to_string());
    format!(
        "[{}] {}: {}",
        when,
        message.sender.as_deref().unwrap_or("Unknown"),
        message.text
    )
}

/// Split text into chunks of at most `budget` characters, preferring
/// paragraph boundaries and falling back to sentence boundaries for
/// oversized paragraphs. A single sentence longer than the budget is kept
/// whole (nothing smaller to split on).
fn split_chunks(text: &str, budget: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    let append = |current: &mut String, chunks: &mut Vec<String>, piece: &str, sep: &str| {
        if !current.is_empty() && current.len() + sep.len() + piece.len() > budget {
            chunks.push(std::mem::take(current));
        }
        if !current.is_empty() {
            current.push_str(sep);
        }
        current.push_str(piece);
    };

    for paragraph in text.split("\n\n") {
        if paragraph.len() > budget {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            for sentence in paragraph.split_inclusive(". ") {
                append(&mut current, &mut chunks, sentence, "");
            }
        } else {
            append(&mut current, &mut chunks, paragraph, "\n\n");
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
