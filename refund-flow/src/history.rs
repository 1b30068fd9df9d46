use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    models::AnalysisEntry,
    storage::{KeyValueStore, KeyValueStoreExt},
};

pub const LAST_ANALYSIS_KEY: &str = "lastAnalysis";
pub const HISTORY_KEY: &str = "analysisHistory";

/// Upper bound on remembered analyses; the oldest fall off first.
pub const MAX_HISTORY: usize = 50;

/// What is stored under the history key, before entries are decoded.
enum StoredHistory {
    Entries(Vec<Value>),
    /// Present but not a JSON array; left as it is.
    Unreadable,
}

/// The most recent analysis plus a bounded, newest-first list of earlier ones.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Makes `entry` the last analysis and puts it at the front of the history.
    ///
    /// Entries with the same case id are kept side by side. Stored entries are carried
    /// over as raw JSON, so ones this version cannot read are not lost.
    pub async fn record(&self, entry: &AnalysisEntry) -> Result<()> {
        self.store.set_json(LAST_ANALYSIS_KEY, entry).await?;

        let StoredHistory::Entries(mut list) = self.stored().await? else {
            warn!(case_id = %entry.case_id, "Stored history is unreadable; not updating it");
            return Ok(());
        };
        list.insert(0, serde_json::to_value(entry)?);
        list.truncate(MAX_HISTORY);
        self.store.set_json(HISTORY_KEY, &list).await?;

        debug!(case_id = %entry.case_id, history_len = list.len(), "Analysis recorded");
        Ok(())
    }

    pub async fn last(&self) -> Result<Option<AnalysisEntry>> {
        self.store.get_json(LAST_ANALYSIS_KEY).await
    }

    /// Readable entries, newest first. Entries that fail to decode are skipped.
    pub async fn list(&self) -> Result<Vec<AnalysisEntry>> {
        let StoredHistory::Entries(list) = self.stored().await? else {
            return Ok(Vec::new());
        };
        Ok(list
            .into_iter()
            .enumerate()
            .filter_map(|(position, value)| {
                serde_json::from_value(value)
                    .inspect_err(|e| {
                        warn!(position, error = %e, "Skipping unreadable history entry")
                    })
                    .ok()
            })
            .collect())
    }

    async fn stored(&self) -> Result<StoredHistory> {
        let Some(raw) = self.store.get(HISTORY_KEY).await? else {
            return Ok(StoredHistory::Entries(Vec::new()));
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(list) => Ok(StoredHistory::Entries(list)),
            Err(e) => {
                warn!(error = %e, "Stored history is not a JSON array");
                Ok(StoredHistory::Unreadable)
            }
        }
    }

    pub async fn get(&self, index: usize) -> Result<Option<AnalysisEntry>> {
        Ok(self.list().await?.into_iter().nth(index))
    }

    /// Copies history entry `index` into the last-analysis slot and returns it.
    pub async fn open(&self, index: usize) -> Result<Option<AnalysisEntry>> {
        let Some(entry) = self.get(index).await? else {
            return Ok(None);
        };
        self.store.set_json(LAST_ANALYSIS_KEY, &entry).await?;
        info!(index, case_id = %entry.case_id, "Opened history entry");
        Ok(Some(entry))
    }

    pub async fn clear_last(&self) -> Result<()> {
        self.store.remove(LAST_ANALYSIS_KEY).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.store.remove(HISTORY_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::AnalysisPayload, storage::InMemoryStore};

    fn entry(case_id: &str) -> AnalysisEntry {
        AnalysisEntry {
            case_id: case_id.to_string(),
            created_at: Some(chrono::Utc::now()),
            status: "analyzed".to_string(),
            progress_percent: Some(100),
            analysis: AnalysisPayload {
                analysis: Some(format!("analysis for {case_id}")),
                ..Default::default()
            },
            report: None,
            receipts: Vec::new(),
        }
    }

    fn history() -> (InMemoryStore, HistoryStore) {
        let store = InMemoryStore::new();
        (store.clone(), HistoryStore::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn history_is_bounded_and_newest_first() {
        let (_, history) = history();
        for i in 0..(MAX_HISTORY + 7) {
            history.record(&entry(&format!("CASE-{i}"))).await.unwrap();
        }

        let list = history.list().await.unwrap();
        assert_eq!(list.len(), MAX_HISTORY);
        assert_eq!(list[0].case_id, format!("CASE-{}", MAX_HISTORY + 6));
        assert_eq!(list[MAX_HISTORY - 1].case_id, "CASE-7");
        assert_eq!(
            history.last().await.unwrap().unwrap().case_id,
            format!("CASE-{}", MAX_HISTORY + 6)
        );
    }

    #[tokio::test]
    async fn duplicate_case_ids_are_kept() {
        let (_, history) = history();
        history.record(&entry("CASE-1")).await.unwrap();
        history.record(&entry("CASE-1")).await.unwrap();
        assert_eq!(history.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn open_copies_entry_into_last() {
        let (_, history) = history();
        history.record(&entry("A")).await.unwrap();
        history.record(&entry("B")).await.unwrap();

        let opened = history.open(1).await.unwrap().unwrap();
        assert_eq!(opened.case_id, "A");
        assert_eq!(history.last().await.unwrap().unwrap().case_id, "A");
        assert_eq!(history.list().await.unwrap()[0].case_id, "B");
        assert!(history.open(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clearing_is_independent() {
        let (_, history) = history();
        history.record(&entry("A")).await.unwrap();

        history.clear_last().await.unwrap();
        assert!(history.last().await.unwrap().is_none());
        assert_eq!(history.list().await.unwrap().len(), 1);

        history.clear_history().await.unwrap();
        assert!(history.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_entry_does_not_cost_the_rest_of_history() {
        let (store, history) = history();
        let stored = serde_json::json!([
            {"case_id": "OLD-1", "status": "analyzed"},
            {"case_id": "OLD-2", "analysis": 5},
            {"case_id": "OLD-3", "created_at": "24/10/2025"}
        ]);
        store.set(HISTORY_KEY, stored.to_string()).await.unwrap();

        let ids = |list: Vec<AnalysisEntry>| -> Vec<String> {
            list.into_iter().map(|e| e.case_id).collect()
        };
        assert_eq!(ids(history.list().await.unwrap()), vec!["OLD-1", "OLD-3"]);

        history.record(&entry("NEW")).await.unwrap();
        assert_eq!(
            ids(history.list().await.unwrap()),
            vec!["NEW", "OLD-1", "OLD-3"]
        );

        // The undecodable entry is still stored as it was.
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&store.get(HISTORY_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[2]["analysis"], 5);
    }

    #[tokio::test]
    async fn corrupt_history_is_left_untouched() {
        let (store, history) = history();
        store.set(HISTORY_KEY, "[oops".to_string()).await.unwrap();
        assert!(history.list().await.unwrap().is_empty());

        history.record(&entry("A")).await.unwrap();
        assert_eq!(history.last().await.unwrap().unwrap().case_id, "A");
        assert_eq!(
            store.get(HISTORY_KEY).await.unwrap().as_deref(),
            Some("[oops")
        );
    }
}
