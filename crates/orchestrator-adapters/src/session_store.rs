use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orchestrator_core::session::SessionSnapshot;
use orchestrator_core::SessionStorePort;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Writes are capped to this many rotating backups per session artifact.
pub const MAX_BACKUPS: usize = 10;

/// A searchable record of one persisted session, used by the optional
/// fuzzy-match registry (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRegistryEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    pub created: DateTime<Utc>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub enabled: bool,
    pub fuzzy_threshold: f32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { enabled: true, fuzzy_threshold: 0.3 }
    }
}

/// `SessionStorePort` over the filesystem: one directory per session under
/// `{root}/sessions/{id}/artifacts/snapshot.json`, written atomically
/// (temp file + rename) with up to `MAX_BACKUPS` rotating prior copies, plus
/// an optional flat `{root}/registry.json` for fuzzy lookup across sessions.
pub struct ArtifactStore {
    root: PathBuf,
    registry: RegistryConfig,
}

impl ArtifactStore {
    pub fn new(root: PathBuf, registry: RegistryConfig) -> Self {
        Self { root, registry }
    }

    fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join("sessions").join(id).join("artifacts")
    }

    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.session_dir(id).join("snapshot.json")
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join(".registry.json")
    }

    async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
        let dir = path.parent().context("artifact path has no parent directory")?;
        fs::create_dir_all(dir).await?;
        let tmp_path = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp_path, contents).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    async fn rotate_backup(path: &Path) -> Result<()> {
        if fs::metadata(path).await.is_err() {
            return Ok(());
        }
        let dir = path.parent().context("artifact path has no parent directory")?;
        let backups_dir = dir.join("backups");
        fs::create_dir_all(&backups_dir).await?;
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot.json");
        let now = Utc::now();
        // No raw `:`/`.` in the stamp per spec §6 ("timestamp with `:` and
        // `.` replaced by `-`"); `%.3f` would otherwise insert a literal `.`
        // before the milliseconds.
        let stamp = format!("{}-{:03}", now.format("%Y%m%d-%H%M%S"), now.timestamp_subsec_millis());
        let backup_path = backups_dir.join(format!("{file_name}.{stamp}.bak"));
        fs::copy(path, &backup_path).await?;

        let mut entries = fs::read_dir(&backups_dir).await?;
        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Ok(metadata) = entry.metadata().await {
                if let Ok(modified) = metadata.modified() {
                    backups.push((entry.path(), modified));
                }
            }
        }
        backups.sort_by_key(|(_, modified)| *modified);
        while backups.len() > MAX_BACKUPS {
            let (oldest, _) = backups.remove(0);
            let _ = fs::remove_file(oldest).await;
        }
        Ok(())
    }

    async fn load_registry(&self) -> Vec<ArtifactRegistryEntry> {
        match fs::read_to_string(self.registry_path()).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    async fn upsert_registry(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if !self.registry.enabled {
            return Ok(());
        }
        let mut entries = self.load_registry().await;
        let path = self.snapshot_path(&snapshot.id).to_string_lossy().to_string();
        let keywords: Vec<String> = snapshot.prompt.split_whitespace().map(|w| w.to_lowercase()).collect();
        entries.retain(|e| e.path != path);
        entries.push(ArtifactRegistryEntry {
            path,
            entry_type: "session".to_string(),
            keywords,
            topics: vec![snapshot.kind.clone()],
            created: snapshot.started_at,
            summary: snapshot.summary.clone(),
        });
        let serialized = serde_json::to_string_pretty(&entries)?;
        Self::write_atomic(&self.registry_path(), &serialized).await
    }
}

#[async_trait]
impl SessionStorePort for ArtifactStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let path = self.snapshot_path(&snapshot.id);
        Self::rotate_backup(&path).await?;
        let serialized = serde_json::to_string_pretty(snapshot)?;
        Self::write_atomic(&path, &serialized).await?;
        self.upsert_registry(snapshot).await
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        match fs::read_to_string(self.snapshot_path(session_id)).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_recent(&self, n: usize) -> Result<Vec<SessionSnapshot>> {
        let mut entries = self.load_registry().await;
        entries.sort_by_key(|e| std::cmp::Reverse(e.created));
        let mut snapshots = Vec::with_capacity(n);
        for entry in entries.into_iter().take(n) {
            if let Ok(raw) = fs::read_to_string(&entry.path).await {
                if let Ok(snapshot) = serde_json::from_str(&raw) {
                    snapshots.push(snapshot);
                }
            }
        }
        Ok(snapshots)
    }
}

/// Fuzzy keyword search over the registry, independent of `SessionStorePort`:
/// used by the search-pipeline collaborator described at its interface only.
pub fn fuzzy_search<'a>(entries: &'a [ArtifactRegistryEntry], query: &str, config: &RegistryConfig) -> Vec<&'a ArtifactRegistryEntry> {
    let query_words: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_string).collect();
    if query_words.is_empty() {
        return Vec::new();
    }
    entries
        .iter()
        .filter(|entry| {
            let matches = query_words.iter().filter(|w| entry.keywords.contains(w) || entry.topics.iter().any(|t| t == *w)).count();
            (matches as f32 / query_words.len() as f32) >= config.fuzzy_threshold
        })
        .collect()
}
