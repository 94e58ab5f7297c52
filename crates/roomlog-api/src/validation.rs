//! Input validation for ingested messages

use validator::ValidationErrors;

/// Maximum length for the room field
pub const MAX_ROOM_LENGTH: u64 = 128;

/// Maximum length for the client_name field
pub const MAX_CLIENT_NAME_LENGTH: u64 = 128;

/// Maximum length for the message body (64KB)
pub const MAX_MESSAGE_LENGTH: u64 = 64 * 1024;

/// Flatten validator errors into a single `field: code` list for responses
pub fn describe_errors(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter()
                .map(move |e| format!("{}: {}", field, e.code))
        })
        .collect();
    parts.sort();
    parts.join(", ")
}
