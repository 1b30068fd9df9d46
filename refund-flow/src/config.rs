use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const BASE_URL_ENV: &str = "REFUND_API_BASE_URL";
pub const DATA_DIR_ENV: &str = "REFUND_DATA_DIR";
pub const SESSION_DIR_ENV: &str = "REFUND_SESSION_DIR";

const APP_DIR: &str = "refund-flow";

/// Where the backend lives and where client state is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Directory of the persistent store (remembered sign-ins, analysis history).
    pub data_dir: PathBuf,
    /// Directory of the session-scoped store (sign-ins without "remember me").
    pub session_dir: PathBuf,
}

impl ClientConfig {
    /// Reads the configuration from `REFUND_*` environment variables, with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = var(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let data_dir = var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let session_dir = var(SESSION_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_session_dir);

        Self {
            base_url,
            data_dir,
            session_dir,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn persistent_store_path(&self) -> PathBuf {
        self.data_dir.join("local.json")
    }

    pub fn session_store_path(&self) -> PathBuf {
        self.session_dir.join("session.json")
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

fn default_session_dir() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_DIR}-session"))
}
