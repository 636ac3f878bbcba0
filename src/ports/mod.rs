//! Port traits. API boundaries for the hexagon.
//!
//! Outbound only: the CLI, bots and web router drive the use cases directly.

pub mod outbound;

pub use outbound::{AuthPort, LlmPort, MessageStore, StoreStats, TgGateway};
