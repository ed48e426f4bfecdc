//! JSON encoding of messages as stored in a channel's ordered set.

use crate::error::{HistoryError, Result};

use super::types::Message;

/// Encode a message into its stored form.
///
/// Equal messages always encode to identical bytes, which is what lets the
/// backing set collapse a repeated save into a single member.
pub fn encode_message(message: &Message) -> Result<String> {
    serde_json::to_string(message).map_err(HistoryError::Encoding)
}

/// Decode a stored message. Unknown fields are ignored; missing ones fail.
pub fn decode_message(encoded: &str) -> Result<Message> {
    serde_json::from_str(encoded).map_err(HistoryError::Decode)
}

/// Decode a batch, skipping records that fail. Returns the decoded messages
/// and the number skipped.
pub fn decode_all<I, S>(records: I) -> (Vec<Message>, usize)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut skipped = 0;
    let messages = records
        .into_iter()
        .filter_map(|record| match decode_message(record.as_ref()) {
            Ok(message) => Some(message),
            Err(err) => {
                log::warn!("Skipping undecodable history record: {err}");
                skipped += 1;
                None
            }
        })
        .collect();

    (messages, skipped)
}
