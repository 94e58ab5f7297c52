//! HTTP request and response models

use serde::{Deserialize, Serialize};
use validator::Validate;

use roomlog_common::Message;

use crate::validation::{MAX_CLIENT_NAME_LENGTH, MAX_MESSAGE_LENGTH, MAX_ROOM_LENGTH};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// Body of `POST /add`
#[derive(Clone, Debug, Default, Deserialize, Serialize, Validate)]
pub struct AddMessageForm {
    #[validate(length(min = 1, max = MAX_ROOM_LENGTH))]
    pub room: String,
    #[validate(length(min = 1, max = MAX_CLIENT_NAME_LENGTH))]
    pub client_name: String,
    #[serde(default)]
    #[validate(length(max = MAX_MESSAGE_LENGTH))]
    pub message: String,
}

impl From<AddMessageForm> for Message {
    fn from(form: AddMessageForm) -> Self {
        Message::new(form.room, form.client_name, form.message)
    }
}

/// Status body returned by the ingest endpoint
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: Some(message.into()),
        }
    }
}

/// Body of `GET /health`
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub local_messages: usize,
    pub discovery: String,
    pub started_at: i64,
}
