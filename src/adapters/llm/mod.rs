//! LLM adapters: GigaChat client and a mock for tests/development.

pub mod gigachat;
pub mod mock;

pub use gigachat::{GigaChatClient, GigaChatSettings};
pub use mock::MockLlm;
