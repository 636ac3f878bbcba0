//! Adapters implementing the outbound ports over concrete infrastructure.

pub mod bot;
pub mod llm;
pub mod persistence;
pub mod telegram;
pub mod web;
