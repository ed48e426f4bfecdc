//! Channel-scoped message history over an ordered-set store.
//!
//! Messages are encoded as JSON and kept in one sorted set per channel,
//! scored by their nanosecond timestamp. Readers poll with the last timestamp
//! they saw and get everything from there on, a page at a time.
//!
//! # Key Types
//!
//! - [`Message`] - the stored value
//! - [`OrderedStore`] - the sorted-set backend contract
//! - [`SqliteOrderedSet`] - durable backend
//! - [`InMemoryOrderedSet`] - in-process backend for tests
//! - [`CallContext`] - cancellation and deadlines for each call
//! - [`CatchUp`] - polling cursor that delivers each message once

pub mod common;
pub mod config;
pub mod context;
pub mod error;
pub mod storage;

pub use common::{Message, decode_message, encode_message};
pub use context::CallContext;
pub use error::{HistoryError, Result, StoreError};
pub use storage::{
    CatchUp, CatchUpPage, DecodedHistory, FROM_BEGINNING, InMemoryOrderedSet, OrderedStore,
    PAGE_SIZE, SqliteOrderedSet, load_decoded_history, load_history, save_message,
};
