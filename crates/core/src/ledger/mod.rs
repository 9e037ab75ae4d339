//! Audit ledger of outbound FHIR exchanges.
//!
//! Every completed call to the FHIR server is written here before its result is handed back
//! to the caller. Records are immutable; the only removal path is [`RequestLedger::clear`],
//! used by the development data reset.

mod file;
mod memory;

pub use file::FileLedgerStore;
pub use memory::MemoryLedgerStore;

use crate::LedgerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// One outbound call as observed by the gateway, before it is recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct Exchange {
    pub request_url: String,
    pub request_body: Option<Value>,
    pub response_body: Option<Value>,
}

/// A persisted [`Exchange`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub created_by: String,
    pub modified: DateTime<Utc>,
    pub modified_by: String,
    pub request_url: String,
    pub request_body: Option<Value>,
    pub response_body: Option<Value>,
}

/// Storage backend for exchange records.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert(&self, record: &ExchangeRecord) -> LedgerResult<()>;

    /// Most recently created record with this URL.
    async fn find_by_url(&self, url: &str) -> LedgerResult<Option<ExchangeRecord>>;

    /// Remove every record, returning how many were removed.
    async fn clear(&self) -> LedgerResult<usize>;

    async fn count(&self) -> LedgerResult<usize>;
}

/// Records exchanges through a [`LedgerStore`].
#[derive(Clone)]
pub struct RequestLedger {
    store: Arc<dyn LedgerStore>,
}

impl RequestLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// A ledger backed by a fresh [`MemoryLedgerStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLedgerStore::new()))
    }

    /// Persist `exchange` on behalf of `actor`.
    ///
    /// Assigns a new v4 UUID and sets both timestamps and both actor fields. The record is
    /// written once; store failures are returned without retrying.
    pub async fn record(&self, exchange: Exchange, actor: &str) -> LedgerResult<ExchangeRecord> {
        let now = Utc::now();
        let record = ExchangeRecord {
            uuid: Uuid::new_v4(),
            created: now,
            created_by: actor.to_string(),
            modified: now,
            modified_by: actor.to_string(),
            request_url: exchange.request_url,
            request_body: exchange.request_body,
            response_body: exchange.response_body,
        };

        self.store.insert(&record).await?;
        tracing::info!(uuid = %record.uuid, url = %record.request_url, "exchange recorded");
        Ok(record)
    }

    pub async fn query_by_url(&self, url: &str) -> LedgerResult<Option<ExchangeRecord>> {
        self.store.find_by_url(url).await
    }

    pub async fn clear(&self) -> LedgerResult<usize> {
        let removed = self.store.clear().await?;
        tracing::info!(removed, "ledger cleared");
        Ok(removed)
    }

    pub async fn count(&self) -> LedgerResult<usize> {
        self.store.count().await
    }
}

impl std::fmt::Debug for RequestLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLedger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exchange(url: &str, response: Value) -> Exchange {
        Exchange {
            request_url: url.to_string(),
            request_body: None,
            response_body: Some(response),
        }
    }

    #[tokio::test]
    async fn record_assigns_identity_and_actor() {
        let ledger = RequestLedger::in_memory();
        let record = ledger
            .record(exchange("http://fhir.local/Patient", json!({"total": 0})), "clinician-1")
            .await
            .expect("recorded");

        assert_eq!(record.uuid.get_version_num(), 4);
        assert_eq!(record.created, record.modified);
        assert_eq!(record.created_by, "clinician-1");
        assert_eq!(record.modified_by, "clinician-1");
        assert_eq!(record.request_body, None);
        assert_eq!(ledger.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn query_returns_most_recent_for_url() {
        let ledger = RequestLedger::in_memory();
        ledger
            .record(exchange("http://fhir.local/Patient", json!({"n": 1})), "a")
            .await
            .expect("recorded");
        let second = ledger
            .record(exchange("http://fhir.local/Patient", json!({"n": 2})), "a")
            .await
            .expect("recorded");
        ledger
            .record(exchange("http://fhir.local/Other", json!({"n": 3})), "a")
            .await
            .expect("recorded");

        let found = ledger
            .query_by_url("http://fhir.local/Patient")
            .await
            .expect("query")
            .expect("present");
        assert_eq!(found.uuid, second.uuid);

        assert!(ledger
            .query_by_url("http://fhir.local/Missing")
            .await
            .expect("query")
            .is_none());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let ledger = RequestLedger::in_memory();
        for n in 0..3 {
            ledger
                .record(exchange("http://fhir.local/Patient", json!({ "n": n })), "a")
                .await
                .expect("recorded");
        }

        assert_eq!(ledger.clear().await.expect("cleared"), 3);
        assert_eq!(ledger.count().await.expect("count"), 0);
    }
}
