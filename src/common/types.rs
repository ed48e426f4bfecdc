use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain model đại diện một tin nhắn chat trong một kênh.
///
/// The serialized field names are the storage format shared with existing
/// history, so they are pinned with explicit renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "UserName")]
    pub user_name: String,
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "ChannelID")]
    pub channel_id: String,
    /// Nanoseconds since the Unix epoch, supplied by the sender.
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

impl Message {
    /// Build a message stamped with the current time.
    pub fn new(
        text: impl Into<String>,
        user_name: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            user_name: user_name.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            timestamp: now_nanos(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }
}

/// Current wall-clock time in nanoseconds, saturating past year 2262.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
