//! Mock LLM adapter for testing without API calls.
//!
//! Returns deterministic responses and simulates network latency.

use crate::domain::LlmError;
use crate::ports::LlmPort;
use std::time::Duration;
use tracing::info;

/// Mock LLM for tests and for running the bot without GigaChat credentials.
pub struct MockLlm {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
}

impl MockLlm {
    pub fn new() -> Self {
        Self { delay_ms: 50 }
    }

    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmPort for MockLlm {
    async fn summarize(&self, text: &str) -> Result<String, LlmError> {
        info!(text_len = text.len(), "[MOCK] simulating summarization");
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        let lines = text.lines().count();
        Ok(format!(
            "[MOCK] Digest of {lines} lines ({} chars of input).",
            text.len()
        ))
    }

    async fn ask(&self, question: &str) -> Result<String, LlmError> {
        info!(question_len = question.len(), "[MOCK] simulating answer");
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(format!("[MOCK] You asked: {question}"))
    }

    async fn verify(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_summary_is_shorter_than_long_input() {
        let llm = MockLlm::with_delay(1);
        let input = "word ".repeat(200);
        let summary = llm.summarize(&input).await.unwrap();
        assert!(summary.len() < input.len());
        assert!(!summary.is_empty());
    }

    #[tokio::test]
    async fn mock_ask_echoes_the_question() {
        let llm = MockLlm::with_delay(1);
        let answer = llm.ask("ping").await.unwrap();
        assert!(answer.contains("ping"));
    }
}
