//! Persistence for learned failure cases and promoted patterns
//!
//! Two logical tables. Reads of a missing table yield `[]`; writes replace the
//! whole table.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::types::{FailurePattern, LearnedFailureCase};
use crate::error::{FlowcraftError, Result};

pub const CASES_FILE: &str = "failure_cases.json";
pub const PATTERNS_FILE: &str = "failure_patterns.json";

#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn load_cases(&self) -> Result<Vec<LearnedFailureCase>>;
    async fn save_cases(&self, cases: &[LearnedFailureCase]) -> Result<()>;
    async fn load_patterns(&self) -> Result<Vec<FailurePattern>>;
    async fn save_patterns(&self, patterns: &[FailurePattern]) -> Result<()>;
}

/// Two JSON array files in one directory
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_table<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(FlowcraftError::Store {
                    message: format!("read {}: {e}", path.display()),
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&raw) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt pattern store file; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write_table<T: Serialize>(&self, file: &str, rows: &[T]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!(".{file}.{}.tmp", uuid::Uuid::new_v4().simple()));
        let body = serde_json::to_vec_pretty(rows)?;
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), rows = rows.len(), "Pattern store table written");
        Ok(())
    }
}

#[async_trait]
impl PatternStore for JsonFileStore {
    async fn load_cases(&self) -> Result<Vec<LearnedFailureCase>> {
        self.read_table(CASES_FILE).await
    }

    async fn save_cases(&self, cases: &[LearnedFailureCase]) -> Result<()> {
        self.write_table(CASES_FILE, cases).await
    }

    async fn load_patterns(&self) -> Result<Vec<FailurePattern>> {
        self.read_table(PATTERNS_FILE).await
    }

    async fn save_patterns(&self, patterns: &[FailurePattern]) -> Result<()> {
        self.write_table(PATTERNS_FILE, patterns).await
    }
}

/// Process-local store for tests and `--no-learn` style runs
#[derive(Default)]
pub struct MemoryStore {
    cases: Mutex<Vec<LearnedFailureCase>>,
    patterns: Mutex<Vec<FailurePattern>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternStore for MemoryStore {
    async fn load_cases(&self) -> Result<Vec<LearnedFailureCase>> {
        Ok(self.cases.lock().await.clone())
    }

    async fn save_cases(&self, cases: &[LearnedFailureCase]) -> Result<()> {
        *self.cases.lock().await = cases.to_vec();
        Ok(())
    }

    async fn load_patterns(&self) -> Result<Vec<FailurePattern>> {
        Ok(self.patterns.lock().await.clone())
    }

    async fn save_patterns(&self, patterns: &[FailurePattern]) -> Result<()> {
        *self.patterns.lock().await = patterns.to_vec();
        Ok(())
    }
}
