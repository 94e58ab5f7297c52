//! Message model shared by the ingest, export and read paths.

use serde::{Deserialize, Serialize};

/// A short text message posted to a room.
///
/// Messages carry no identity beyond their field values. Two messages with the
/// same fields are indistinguishable and both are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub room: String,
    pub client_name: String,
    /// Message body, serialized as `message` on the HTTP surface.
    #[serde(rename = "message")]
    pub text: String,
}

impl Message {
    pub fn new(
        room: impl Into<String>,
        client_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            client_name: client_name.into(),
            text: text.into(),
        }
    }
}
