//! The ordered-set contract the history store is written against.

use async_trait::async_trait;

use crate::error::StoreError;

/// Inclusive score bounds for a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRange {
    pub min: i64,
    pub max: i64,
}

impl ScoreRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Every score from `min` upward.
    pub fn at_least(min: i64) -> Self {
        Self::new(min, i64::MAX)
    }

    pub fn all() -> Self {
        Self::at_least(i64::MIN)
    }

    pub fn contains(&self, score: i64) -> bool {
        self.min <= score && score <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// A keyed collection of unique string members, each sorted by an integer
/// score.
///
/// Implementations must behave like a Redis sorted set: inserting an existing
/// member replaces its score instead of adding a second copy, and members with
/// equal scores are ordered by byte-wise comparison of the member.
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Insert or re-score `member` under `key`. Returns true when the member
    /// was not present before.
    async fn ordered_insert(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError>;

    /// Members of `key` whose score falls in `range`, in `order`, at most
    /// `limit` of them.
    async fn ordered_range_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        order: Order,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;
}
