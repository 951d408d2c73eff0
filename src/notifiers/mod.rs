//! The downstream notification transports.
//!
//! Each transport implements the `Notifier` trait from `core` and is a thin
//! HTTP client with a bounded timeout. Neither performs retries or
//! deduplication; one call is one delivery attempt.

pub mod chat;
pub mod email;

pub use chat::ChatNotifier;
pub use email::EmailNotifier;
