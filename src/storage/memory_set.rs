//! In-memory ordered set for tests and local runs.
//!
//! Nothing is persisted. The store can be told to fail or to stall so callers
//! can exercise their error and cancellation paths.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

use super::ordered_set::{Order, OrderedStore, ScoreRange};

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

/// In-memory implementation of [`OrderedStore`].
#[derive(Debug, Default)]
pub struct InMemoryOrderedSet {
    sets: RwLock<HashMap<String, SortedSet>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryOrderedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of members stored under `key`.
    pub async fn len(&self, key: &str) -> usize {
        self.sets
            .read()
            .await
            .get(key)
            .map_or(0, |set| set.scores.len())
    }

    pub async fn is_empty(&self, key: &str) -> bool {
        self.len(key).await == 0
    }

    async fn before_call(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderedStore for InMemoryOrderedSet {
    async fn ordered_insert(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError> {
        self.before_call().await?;

        let mut sets = self.sets.write().await;
        let set = sets.entry(key.to_string()).or_default();
        let previous = set.scores.insert(member.to_string(), score);
        if let Some(old_score) = previous {
            set.ordered.remove(&(old_score, member.to_string()));
        }
        set.ordered.insert((score, member.to_string()));

        Ok(previous.is_none())
    }

    async fn ordered_range_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        order: Order,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.before_call().await?;

        let sets = self.sets.read().await;
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };
        if range.min > range.max {
            return Ok(Vec::new());
        }

        let matching = set
            .ordered
            .range((range.min, String::new())..)
            .take_while(|(score, _)| range.contains(*score))
            .map(|(_, member)| member.clone());

        let members = match order {
            Order::Ascending => matching.take(limit).collect(),
            Order::Descending => {
                let mut all: Vec<String> = matching.collect();
                all.reverse();
                all.truncate(limit);
                all
            }
        };

        Ok(members)
    }
}
