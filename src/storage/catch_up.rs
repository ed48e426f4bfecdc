//! Watermark-tracking reader for polling a channel.

use std::collections::HashSet;

use crate::common::{Message, decode_message};
use crate::context::CallContext;
use crate::error::Result;

use super::history::{FROM_BEGINNING, PAGE_SIZE, load_history};
use super::ordered_set::OrderedStore;

/// Messages delivered by one [`CatchUp::poll`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchUpPage {
    pub messages: Vec<Message>,
    pub skipped: usize,
    /// The store returned a full page; poll again right away for the rest.
    pub more_pending: bool,
}

/// Follows a channel, delivering each stored message once.
///
/// Loads are inclusive of the watermark, so every poll re-reads the messages
/// stamped exactly at the watermark. Their encoded forms are remembered and
/// dropped on the next poll. A cursor resumed from a bare timestamp has no such
/// memory and redelivers the messages at that timestamp once.
///
/// Undecodable records carry no usable timestamp, so they never move the
/// watermark. Each one is logged and counted in `skipped` the first time it is
/// read and silently dropped after that.
///
/// The cursor cannot page past a full page that brings nothing new. That
/// happens with more than [`PAGE_SIZE`] messages sharing one timestamp, with
/// [`PAGE_SIZE`] or more undecodable records at or after the watermark, and,
/// while the watermark sits at exactly zero (which reads from the beginning),
/// with [`PAGE_SIZE`] or more messages stamped before the epoch. In each case
/// it logs a warning and keeps returning nothing new.
#[derive(Debug, Clone)]
pub struct CatchUp {
    channel_id: String,
    watermark: Option<i64>,
    seen_at_watermark: HashSet<String>,
    undecodable: HashSet<String>,
}

impl CatchUp {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self::resume(channel_id, FROM_BEGINNING)
    }

    pub fn resume(channel_id: impl Into<String>, watermark: i64) -> Self {
        Self {
            channel_id: channel_id.into(),
            watermark: (watermark != FROM_BEGINNING).then_some(watermark),
            seen_at_watermark: HashSet::new(),
            undecodable: HashSet::new(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Timestamp of the newest message delivered so far.
    pub fn watermark(&self) -> i64 {
        self.watermark.unwrap_or(FROM_BEGINNING)
    }

    pub async fn poll<S>(&mut self, ctx: &CallContext, store: &S) -> Result<CatchUpPage>
    where
        S: OrderedStore + ?Sized,
    {
        let records = load_history(ctx, store, &self.channel_id, self.watermark()).await?;
        let more_pending = records.len() >= PAGE_SIZE;

        let mut page = CatchUpPage {
            more_pending,
            ..CatchUpPage::default()
        };

        for record in records {
            if self.undecodable.contains(&record) {
                continue;
            }
            let message = match decode_message(&record) {
                Ok(message) => message,
                Err(err) => {
                    log::warn!("Skipping undecodable record in {}: {err}", self.channel_id);
                    page.skipped += 1;
                    self.undecodable.insert(record);
                    continue;
                }
            };

            let timestamp = message.timestamp;
            match self.watermark {
                // A zero watermark reads from the beginning again.
                Some(watermark) if timestamp < watermark => continue,
                Some(watermark)
                    if timestamp == watermark && self.seen_at_watermark.contains(&record) =>
                {
                    continue;
                }
                Some(watermark) if timestamp == watermark => {}
                _ => {
                    self.watermark = Some(timestamp);
                    self.seen_at_watermark.clear();
                }
            }
            self.seen_at_watermark.insert(record);
            page.messages.push(message);
        }

        if more_pending && page.messages.is_empty() {
            log::warn!(
                "Channel {} has a full page at timestamp {}; cannot advance",
                self.channel_id,
                self.watermark()
            );
        }

        Ok(page)
    }
}
