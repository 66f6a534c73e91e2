//! Binding between record types and the collection that stores them.

use companion_core::{ChatMessage, User};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::transaction::Collection;

/// A record stored as a JSON document in one collection, keyed by its primary key and
/// reachable through the collection's single secondary index.
pub trait StoredRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    /// Serialized names of the typed fields; the flattened extra fields must not reuse them.
    const FIELDS: &'static [&'static str];

    fn primary_key(&self) -> &str;

    /// Value of the field covered by the collection's secondary index.
    fn index_key(&self) -> &str;

    /// Free-form fields flattened next to the typed ones.
    fn extra_fields(&self) -> &Map<String, Value>;

    /// First extra field that shadows a typed field, if any.
    fn shadowed_field(&self) -> Option<&'static str> {
        Self::FIELDS
            .iter()
            .copied()
            .find(|field| self.extra_fields().contains_key(*field))
    }
}

impl StoredRecord for User {
    const COLLECTION: Collection = Collection::Users;
    const FIELDS: &'static [&'static str] = &["id", "username"];

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn index_key(&self) -> &str {
        &self.username
    }

    fn extra_fields(&self) -> &Map<String, Value> {
        &self.profile
    }
}

impl StoredRecord for ChatMessage {
    const COLLECTION: Collection = Collection::Messages;
    const FIELDS: &'static [&'static str] = &["id", "userId", "timestamp"];

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn index_key(&self) -> &str {
        &self.user_id
    }

    fn extra_fields(&self) -> &Map<String, Value> {
        &self.extra
    }
}
