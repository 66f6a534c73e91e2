//! # companion-core
//!
//! Record shapes shared by the companion crates ([`User`], [`ChatMessage`]) and
//! tracing initialization. Storage-agnostic; used by companion-storage.

pub mod logger;
pub mod types;

pub use logger::init_tracing;
pub use types::{ChatMessage, User};
