//! tg-digest: Telegram message collection and GigaChat digests, Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
