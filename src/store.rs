use crate::engine::queue::QueueEntry;
use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub selected_device_id: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub entries: Vec<QueueEntry>,
}

/// Single JSON file holding the latest [`SessionSnapshot`], rewritten in
/// full on every save.
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot; a missing file is an empty session.
    pub fn load(&self) -> AppResult<SessionSnapshot> {
        if !self.path.exists() {
            return Ok(SessionSnapshot::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)?;
        log::info!(
            "Loaded session from {} ({} queued tracks)",
            self.path.display(),
            snapshot.entries.len()
        );
        Ok(snapshot)
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        // Replace atomically: sibling temp file, then rename.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
