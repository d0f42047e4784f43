use std::path::PathBuf;

use anyhow::Result;

use orchestrator_adapters::session_store::RegistryConfig;

/// Load `.env` from the current directory and its two parents (best-effort),
/// so `RELAY_*`/`GROQ_API_KEY` can be set without shell exports. Existing
/// environment variables always win over the file.
pub fn load_dotenv() {
    for path in [".env", "../.env", "../../.env"] {
        if let Ok(content) = std::fs::read_to_string(path) {
            apply_env_file(&content);
        }
    }
}

fn apply_env_file(content: &str) {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim();
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !key.is_empty() && std::env::var(key).is_err() {
            // SAFETY: single-threaded at startup, before the event loop or any
            // effect tasks that might read the environment concurrently.
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Relay transport settings, read from the environment described in spec §6.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub ws_url: String,
    pub session_id: String,
    pub auth_token: String,
    pub heartbeat_secs: u64,
}

impl RelayConfig {
    /// `None` when the relay is simply not configured (no `RELAY_SESSION_ID`);
    /// that is not an error, the process just runs without a transport.
    pub fn from_env() -> Option<Self> {
        let session_id = std::env::var("RELAY_SESSION_ID").ok()?;
        let auth_token = std::env::var("RELAY_AUTH_TOKEN").unwrap_or_default();
        let ws_url = std::env::var("RELAY_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:3001/ws".to_string());
        let heartbeat_secs = std::env::var("RELAY_HEARTBEAT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20)
            .max(5);
        Some(Self { ws_url, session_id, auth_token, heartbeat_secs })
    }
}

/// Top-level settings assembled at startup and handed into the loop; nothing
/// downstream reaches back into the environment or a global singleton.
#[derive(Debug, Clone)]
pub struct Config {
    pub groq_api_key: Option<String>,
    pub artifacts_root: PathBuf,
    pub relay: Option<RelayConfig>,
    pub registry: RegistryConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let artifacts_root = std::env::var("WORKSTATION_ARTIFACTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_artifacts_root().unwrap_or_else(|| PathBuf::from(".codewalk")));

        Ok(Self {
            groq_api_key: std::env::var("GROQ_API_KEY").ok(),
            artifacts_root,
            relay: RelayConfig::from_env(),
            registry: RegistryConfig::default(),
        })
    }
}

fn default_artifacts_root() -> Option<PathBuf> {
    dirs_next_home().map(|home| home.join(".codewalk"))
}

/// Minimal `$HOME` lookup; avoids pulling in a whole `dirs` dependency for
/// one fallback path.
fn dirs_next_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
