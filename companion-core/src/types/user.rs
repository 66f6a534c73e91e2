//! User profile record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User profile: unique id, unique username, and any other profile fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// Remaining profile fields (display name, avatar, preferences...), stored as-is.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            profile: Map::new(),
        }
    }

    /// Sets one extra profile field, replacing any previous value under `key`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.profile.insert(key.into(), value.into());
        self
    }
}
