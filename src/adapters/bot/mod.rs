//! Telegram Bot API adapters (teloxide).

pub mod commands;
pub mod echo;
pub mod handlers;

pub use handlers::BotDeps;
