use super::{ExchangeRecord, LedgerStore};
use crate::LedgerResult;
use tokio::sync::RwLock;

/// Process-local ledger store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    records: RwLock<Vec<ExchangeRecord>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert(&self, record: &ExchangeRecord) -> LedgerResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn find_by_url(&self, url: &str) -> LedgerResult<Option<ExchangeRecord>> {
        // Insertion order is creation order.
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.request_url == url)
            .cloned())
    }

    async fn clear(&self) -> LedgerResult<usize> {
        let mut records = self.records.write().await;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn count(&self) -> LedgerResult<usize> {
        Ok(self.records.read().await.len())
    }
}
