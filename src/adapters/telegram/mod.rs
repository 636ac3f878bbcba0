//! Telegram MTProto adapters (grammers): auth and gateway.

pub mod auth_adapter;
pub mod client;
pub mod mapper;

pub use auth_adapter::GrammersAuthAdapter;
pub use client::GrammersGateway;
