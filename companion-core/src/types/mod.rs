//! Core record types: user profile and chat message.
//!
//! One file per type. Fields beyond the identifying ones are kept as opaque JSON
//! so records written by other components round-trip untouched.

mod chat_message;
mod user;

pub use chat_message::ChatMessage;
pub use user::User;
