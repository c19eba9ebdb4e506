//! Persisted generation records used for idempotent replay.

use crate::cache::DedupDigest;
use crate::plan::NormalizedPlan;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;
use uuid::Uuid;

/// One stored generation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub dedup_digest: DedupDigest,
    pub contract_version: String,
    pub input_snapshot: serde_json::Value,
    pub result_plan: NormalizedPlan,
    pub created_at: SystemTime,
}

impl GenerationRecord {
    pub fn new(
        owner_id: impl Into<String>,
        dedup_digest: DedupDigest,
        contract_version: impl Into<String>,
        input_snapshot: serde_json::Value,
        result_plan: NormalizedPlan,
        created_at: SystemTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            dedup_digest,
            contract_version: contract_version.into(),
            input_snapshot,
            result_plan,
            created_at,
        }
    }
}

/// Conjunctive filter; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub owner_id: Option<String>,
    pub dedup_digest: Option<DedupDigest>,
    pub contract_version: Option<String>,
    pub created_after: Option<SystemTime>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotency key lookup.
    pub fn idempotency_key(owner_id: &str, digest: &DedupDigest, contract_version: &str) -> Self {
        Self {
            owner_id: Some(owner_id.to_string()),
            dedup_digest: Some(digest.clone()),
            contract_version: Some(contract_version.to_string()),
            created_after: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_created_after(mut self, at: SystemTime) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn matches(&self, record: &GenerationRecord) -> bool {
        self.owner_id.as_ref().map_or(true, |o| *o == record.owner_id)
            && self
                .dedup_digest
                .as_ref()
                .map_or(true, |d| *d == record.dedup_digest)
            && self
                .contract_version
                .as_ref()
                .map_or(true, |v| *v == record.contract_version)
            && self.created_after.map_or(true, |t| record.created_at > t)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn newest(limit: usize) -> Self {
        Self {
            sort: SortOrder::NewestFirst,
            limit: Some(limit),
        }
    }
}

/// Document-style store for generation records.
///
/// Writes are at-least-once: `create` does not have to reject a second record for the same
/// idempotency key. A store that does enforce uniqueness reports the conflict as
/// [`Error::DuplicateRecordRace`].
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Earliest record matching `filter`.
    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<GenerationRecord>>;
    async fn create(&self, record: GenerationRecord) -> Result<GenerationRecord>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationRecord>>;
    async fn find(&self, filter: &RecordFilter, options: FindOptions) -> Result<Vec<GenerationRecord>>;
    fn name(&self) -> &'static str;
}

/// Process-local store. Accepts duplicate idempotency keys unless built with
/// [`InMemoryGenerationStore::enforce_unique`].
#[derive(Debug, Default)]
pub struct InMemoryGenerationStore {
    records: RwLock<Vec<GenerationRecord>>,
    enforce_unique: bool,
}

impl InMemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enforce_unique() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            enforce_unique: true,
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GenerationStore for InMemoryGenerationStore {
    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<GenerationRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| filter.matches(r))
            .min_by_key(|r| r.created_at)
            .cloned())
    }

    async fn create(&self, record: GenerationRecord) -> Result<GenerationRecord> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.iter().any(|r| r.id == record.id) {
            return Err(Error::store_with_context(
                "record id already exists",
                ErrorContext::new()
                    .with_details(format!("id: {}", record.id))
                    .with_source(self.name()),
            ));
        }
        if self.enforce_unique {
            let key = RecordFilter::idempotency_key(
                &record.owner_id,
                &record.dedup_digest,
                &record.contract_version,
            );
            if records.iter().any(|r| key.matches(r)) {
                return Err(Error::DuplicateRecordRace {
                    digest: record.dedup_digest.to_string(),
                });
            }
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn find(&self, filter: &RecordFilter, options: FindOptions) -> Result<Vec<GenerationRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<GenerationRecord> =
            records.iter().filter(|r| filter.matches(r)).cloned().collect();
        match options.sort {
            SortOrder::NewestFirst => found.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::OldestFirst => found.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        if let Some(limit) = options.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "in_memory_store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{digest, CanonicalKey, RequestDescriptor};
    use std::time::Duration;

    fn dg(tag: &str) -> DedupDigest {
        let key: CanonicalKey = RequestDescriptor::new("POST", "/t").param("tag", tag).canonicalize();
        digest(&key, "v2")
    }

    fn record(owner: &str, tag: &str, secs: u64) -> GenerationRecord {
        GenerationRecord::new(
            owner,
            dg(tag),
            "v2",
            serde_json::json!({"tag": tag}),
            NormalizedPlan::default(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        )
    }

    #[tokio::test]
    async fn find_one_matches_full_idempotency_key() {
        let store = InMemoryGenerationStore::new();
        store.create(record("a", "legs", 10)).await.unwrap();

        let hit = store
            .find_one(&RecordFilter::idempotency_key("a", &dg("legs"), "v2"))
            .await
            .unwrap();
        assert!(hit.is_some());

        for filter in [
            RecordFilter::idempotency_key("b", &dg("legs"), "v2"),
            RecordFilter::idempotency_key("a", &dg("arms"), "v2"),
            RecordFilter::idempotency_key("a", &dg("legs"), "v3"),
        ] {
            assert!(store.find_one(&filter).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn relaxed_store_accepts_duplicates_and_returns_earliest() {
        let store = InMemoryGenerationStore::new();
        let first = store.create(record("a", "legs", 10)).await.unwrap();
        store.create(record("a", "legs", 20)).await.unwrap();
        assert_eq!(store.len(), 2);

        let hit = store
            .find_one(&RecordFilter::idempotency_key("a", &dg("legs"), "v2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, first.id);
    }

    #[tokio::test]
    async fn unique_store_reports_race() {
        let store = InMemoryGenerationStore::enforce_unique();
        store.create(record("a", "legs", 10)).await.unwrap();
        let err = store.create(record("a", "legs", 20)).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateRecordRace { .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn find_sorts_and_limits() {
        let store = InMemoryGenerationStore::new();
        store.create(record("a", "one", 10)).await.unwrap();
        store.create(record("a", "two", 30)).await.unwrap();
        store.create(record("a", "three", 20)).await.unwrap();
        store.create(record("b", "four", 40)).await.unwrap();

        let newest = store
            .find(&RecordFilter::new().with_owner("a"), FindOptions::newest(2))
            .await
            .unwrap();
        let tags: Vec<_> = newest.iter().map(|r| r.input_snapshot["tag"].clone()).collect();
        assert_eq!(tags, vec!["two", "three"]);

        let oldest = store
            .find(
                &RecordFilter::new().with_owner("a"),
                FindOptions {
                    sort: SortOrder::OldestFirst,
                    limit: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(oldest.len(), 3);
        assert_eq!(oldest[0].input_snapshot["tag"], "one");

        let by_id = store.find_by_id(newest[0].id).await.unwrap();
        assert_eq!(by_id.map(|r| r.id), Some(newest[0].id));
    }
}
