use super::{ExchangeRecord, LedgerStore};
use crate::{LedgerError, LedgerResult};
use std::path::{Path, PathBuf};
use tokio::fs;

const RECORD_EXTENSION: &str = "json";

/// Ledger store keeping one `<uuid>.json` file per record in a directory.
///
/// Files are written to a temporary name and renamed into place, so a crash mid-write never
/// leaves a truncated record behind.
#[derive(Clone, Debug)]
pub struct FileLedgerStore {
    dir: PathBuf,
}

impl FileLedgerStore {
    /// Open (creating if needed) the ledger directory.
    pub async fn open(dir: impl Into<PathBuf>) -> LedgerResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            LedgerError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create ledger directory {}: {}", dir.display(), e),
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, record: &ExchangeRecord) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORD_EXTENSION}", record.uuid.simple()))
    }

    async fn record_paths(&self) -> LedgerResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
                && entry.file_type().await?.is_file()
            {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn read_record(path: &Path) -> LedgerResult<ExchangeRecord> {
        let contents = fs::read(path).await?;
        serde_json::from_slice(&contents).map_err(|source| LedgerError::Deserialization {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait::async_trait]
impl LedgerStore for FileLedgerStore {
    async fn insert(&self, record: &ExchangeRecord) -> LedgerResult<()> {
        let json = serde_json::to_vec_pretty(record).map_err(LedgerError::Serialization)?;
        let path = self.record_path(record);
        let tmp = path.with_extension("tmp");

        fs::write(&tmp, &json).await.map_err(|e| {
            LedgerError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write ledger record {}: {}", tmp.display(), e),
            ))
        })?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn find_by_url(&self, url: &str) -> LedgerResult<Option<ExchangeRecord>> {
        let mut latest: Option<ExchangeRecord> = None;
        for path in self.record_paths().await? {
            let record = match Self::read_record(&path).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("skipping unreadable ledger record: {e}");
                    continue;
                }
            };
            if record.request_url != url {
                continue;
            }
            if latest.as_ref().map_or(true, |l| record.created > l.created) {
                latest = Some(record);
            }
        }
        Ok(latest)
    }

    async fn clear(&self) -> LedgerResult<usize> {
        let paths = self.record_paths().await?;
        for path in &paths {
            fs::remove_file(path).await?;
        }
        Ok(paths.len())
    }

    async fn count(&self) -> LedgerResult<usize> {
        Ok(self.record_paths().await?.len())
    }
}
