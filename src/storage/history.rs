//! Per-channel message history on top of an [`OrderedStore`].
//!
//! A channel is nothing more than the key `messages:<channel_id>`; it comes
//! into existence with its first saved message and there is no registry of
//! channels. Each stored member is an encoded [`Message`] scored by its
//! timestamp.
//!
//! Reads use an inclusive lower bound. A caller that resumes from the
//! timestamp of the last message it saw gets that message again and has to
//! drop it (see [`super::catch_up::CatchUp`], which does exactly that).

use crate::common::{Message, decode_all, encode_message};
use crate::context::CallContext;
use crate::error::{HistoryError, Result};

use super::ordered_set::{Order, OrderedStore, ScoreRange};

/// Namespace prefix of every channel key.
pub const MESSAGE_NAMESPACE: &str = "messages";

/// Maximum number of messages returned by one history load.
pub const PAGE_SIZE: usize = 100;

/// `since` value that reads a channel from its first message.
pub const FROM_BEGINNING: i64 = 0;

pub fn channel_key(channel_id: &str) -> String {
    format!("{MESSAGE_NAMESPACE}:{channel_id}")
}

/// Append `message` to its channel's history.
///
/// Saving a message identical in every field to one already stored leaves a
/// single copy.
pub async fn save_message<S>(ctx: &CallContext, store: &S, message: &Message) -> Result<()>
where
    S: OrderedStore + ?Sized,
{
    let member = encode_message(message)?;
    let key = channel_key(&message.channel_id);

    let added = ctx
        .run(async {
            store
                .ordered_insert(&key, message.timestamp, &member)
                .await
                .map_err(HistoryError::StoreWrite)
        })
        .await?;

    if added {
        log::debug!("Saved message to {key} at {}", message.timestamp);
    } else {
        log::debug!("Message already stored in {key} at {}", message.timestamp);
    }
    Ok(())
}

/// Load up to [`PAGE_SIZE`] encoded messages of `channel_id` with a timestamp
/// of at least `since`, oldest first.
///
/// `since == FROM_BEGINNING` reads from the very first message, including any
/// stamped before the epoch. Records are returned as stored; decoding is left
/// to the caller.
pub async fn load_history<S>(
    ctx: &CallContext,
    store: &S,
    channel_id: &str,
    since: i64,
) -> Result<Vec<String>>
where
    S: OrderedStore + ?Sized,
{
    let key = channel_key(channel_id);
    let lower = if since == FROM_BEGINNING { i64::MIN } else { since };

    let records = ctx
        .run(async {
            store
                .ordered_range_by_score(&key, ScoreRange::at_least(lower), Order::Ascending, PAGE_SIZE)
                .await
                .map_err(HistoryError::StoreRead)
        })
        .await?;

    log::debug!("Loaded {} records from {key} since {since}", records.len());
    Ok(records)
}

/// A history page decoded with the skip-and-count policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedHistory {
    pub messages: Vec<Message>,
    /// Records that could not be decoded and were left out.
    pub skipped: usize,
    /// Records returned by the store, decodable or not.
    pub fetched: usize,
}

impl DecodedHistory {
    /// True when the store returned a full page, so more history may follow.
    pub fn is_full_page(&self) -> bool {
        self.fetched >= PAGE_SIZE
    }

    /// Timestamp of the newest decoded message.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.messages.last().map(|message| message.timestamp)
    }
}

/// [`load_history`] followed by decoding. One corrupt record never hides the
/// rest of the page.
pub async fn load_decoded_history<S>(
    ctx: &CallContext,
    store: &S,
    channel_id: &str,
    since: i64,
) -> Result<DecodedHistory>
where
    S: OrderedStore + ?Sized,
{
    let records = load_history(ctx, store, channel_id, since).await?;
    let fetched = records.len();
    let (messages, skipped) = decode_all(&records);

    if skipped > 0 {
        log::warn!("Skipped {skipped} of {fetched} records in channel {channel_id}");
    }

    Ok(DecodedHistory {
        messages,
        skipped,
        fetched,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::StoreError;
    use crate::storage::memory_set::InMemoryOrderedSet;

    fn message(channel: &str, timestamp: i64) -> Message {
        Message::new(format!("at {timestamp}"), "John Doe", "1234", channel).with_timestamp(timestamp)
    }

    #[test]
    fn channel_key_uses_namespace() {
        assert_eq!(channel_key("5678"), "messages:5678");
        assert_eq!(channel_key(""), "messages:");
    }

    #[tokio::test]
    async fn save_stores_encoded_member_under_channel_key() {
        let store = InMemoryOrderedSet::new();
        let ctx = CallContext::new();
        let msg = message("5678", 42);

        save_message(&ctx, &store, &msg).await.unwrap();

        let members = store
            .ordered_range_by_score("messages:5678", ScoreRange::all(), Order::Ascending, 10)
            .await
            .unwrap();
        assert_eq!(members, vec![encode_message(&msg).unwrap()]);
    }

    #[tokio::test]
    async fn save_wraps_store_failures() {
        let store = InMemoryOrderedSet::new();
        store.set_unavailable(true);

        let err = save_message(&CallContext::new(), &store, &message("c", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::StoreWrite(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn load_wraps_store_failures() {
        let store = InMemoryOrderedSet::new();
        store.set_unavailable(true);

        let err = load_history(&CallContext::new(), &store, "c", FROM_BEGINNING)
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::StoreRead(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn from_beginning_includes_pre_epoch_messages() {
        let store = InMemoryOrderedSet::new();
        let ctx = CallContext::new();
        save_message(&ctx, &store, &message("c", -5)).await.unwrap();
        save_message(&ctx, &store, &message("c", 5)).await.unwrap();

        let records = load_history(&ctx, &store, "c", FROM_BEGINNING).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_save_writes_nothing() {
        let store = InMemoryOrderedSet::new();
        let ctx = CallContext::new();
        ctx.cancel();

        let err = save_message(&ctx, &store, &message("c", 1)).await.unwrap_err();

        assert!(matches!(err, HistoryError::Cancelled));
        assert!(store.is_empty("messages:c").await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_hits_deadline() {
        let store = InMemoryOrderedSet::new();
        store.set_latency(Duration::from_secs(30));
        let ctx = CallContext::new().with_timeout(Duration::from_millis(100));

        let err = load_history(&ctx, &store, "c", FROM_BEGINNING)
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn decoded_history_reports_page_state() {
        let store = InMemoryOrderedSet::new();
        let ctx = CallContext::new();
        for ts in 1..=3 {
            save_message(&ctx, &store, &message("c", ts)).await.unwrap();
        }
        store.ordered_insert("messages:c", 2, "corrupt").await.unwrap();

        let page = load_decoded_history(&ctx, &store, "c", FROM_BEGINNING)
            .await
            .unwrap();

        assert_eq!(page.fetched, 4);
        assert_eq!(page.skipped, 1);
        assert_eq!(page.messages.len(), 3);
        assert_eq!(page.last_timestamp(), Some(3));
        assert!(!page.is_full_page());
    }
}
