//! Application use cases. Orchestrate domain logic via ports.

pub mod auth_service;
pub mod collector_service;
pub mod digest_service;

pub use auth_service::AuthService;
pub use collector_service::{CollectStats, CollectorService};
pub use digest_service::{DigestOutcome, DigestService, resolve_input};
