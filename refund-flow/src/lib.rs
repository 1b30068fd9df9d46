pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod normalizer;
pub mod session;
pub mod storage;
pub mod upload;
pub mod views;

// Re-export commonly used types
pub use client::{ApiClient, CaseSubmission, FileUpload};
pub use config::ClientConfig;
pub use error::{FlowError, Result};
pub use history::{HistoryStore, MAX_HISTORY};
pub use models::{
    AnalysisEntry, AnalysisPayload, AuthUser, ClassificationResult, EligibilityResult,
    FinalReport, ReceiptDocument, ReportBundle,
};
pub use normalizer::{NormalizedAnalysis, normalize, normalize_with};
pub use session::{Session, SessionScope, SessionStore, sign_in, sign_out};
pub use storage::{FileStore, InMemoryStore, KeyValueStore, KeyValueStoreExt};
pub use upload::{UploadRequest, analyze_issue, submit, summarize_files};
pub use views::{DashboardView, ResultView};

use std::sync::Arc;

/// Everything a front-end needs, passed explicitly instead of read from ambient state.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub sessions: SessionStore,
    pub history: HistoryStore,
}

impl AppState {
    pub fn new(
        api: ApiClient,
        persistent: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            api,
            sessions: SessionStore::new(persistent.clone(), session),
            history: HistoryStore::new(persistent),
        }
    }

    /// File-backed state at the configured locations.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            ApiClient::from_config(config),
            Arc::new(FileStore::new(config.persistent_store_path())),
            Arc::new(FileStore::new(config.session_store_path())),
        )
    }

    pub async fn dashboard(&self) -> Result<DashboardView> {
        let last = self.history.last().await?;
        let history = self.history.list().await?;
        Ok(DashboardView::build(last.as_ref(), &history))
    }

    pub async fn result(&self) -> Result<ResultView> {
        let last = self.history.last().await?;
        Ok(ResultView::build(last.as_ref()))
    }
}
