//! Generated export protocol types and their conversions to the shared model.

use roomlog_common::Message;

tonic::include_proto!("roomlog.v1");

impl From<Message> for LogRecord {
    fn from(message: Message) -> Self {
        Self {
            room: message.room,
            client_name: message.client_name,
            message: message.text,
        }
    }
}

impl From<LogRecord> for Message {
    fn from(record: LogRecord) -> Self {
        Message {
            room: record.room,
            client_name: record.client_name,
            text: record.message,
        }
    }
}
