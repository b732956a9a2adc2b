use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domain::diagnostics::{WHITESPACE, trim};
use domain::{DomainError, StateStore};

/// `key=value` lines on disk, one file per dome
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, contents: &str) -> Result<BTreeMap<String, String>, DomainError> {
        let mut pairs = BTreeMap::new();
        for (number, line) in contents.lines().enumerate() {
            let line = trim(line, WHITESPACE);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                DomainError::InvalidConfiguration(format!(
                    "{}:{}: expected key=value",
                    self.path.display(),
                    number + 1
                ))
            })?;
            pairs.insert(
                trim(key, WHITESPACE).to_string(),
                trim(value, WHITESPACE).to_string(),
            );
        }
        Ok(pairs)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<BTreeMap<String, String>, DomainError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let pairs = self.parse(&contents)?;
                tracing::debug!(path = %self.path.display(), keys = pairs.len(), "Loaded dome state");
                Ok(pairs)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No saved dome state yet");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(DomainError::Io(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, pairs: &BTreeMap<String, String>) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let mut contents = String::from("# dome controller state\n");
        for (key, value) in pairs {
            contents.push_str(&format!("{key}={value}\n"));
        }

        // Staging file, then rename over the target
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| DomainError::Io(format!("Failed to write {}: {}", staging.display(), e)))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| DomainError::Io(format!("Failed to replace {}: {}", self.path.display(), e)))?;

        tracing::debug!(path = %self.path.display(), keys = pairs.len(), "Saved dome state");
        Ok(())
    }
}
