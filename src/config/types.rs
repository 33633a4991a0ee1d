//! Configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapter::{ExecuteOptions, PermissionMode};

/// Supported agent CLI backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Claude,
    Codex,
    Gemini,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }
}

/// Defaults applied to every call made through one adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Executable path or name; the backend's own name when unset.
    pub cli_path: Option<String>,
    /// Default model.
    pub model: Option<String>,
    /// Default deadline in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Extra environment variables for every call.
    pub env: BTreeMap<String, String>,
    /// Base directory for execution logs.
    pub log_dir: Option<PathBuf>,
    /// Default permission mode.
    pub permission_mode: Option<PermissionMode>,
}

impl AdapterConfig {
    /// Produce effective options: every field set on `options` wins, unset
    /// fields take this config's default. Neither input is modified.
    #[must_use]
    pub fn apply_defaults(&self, options: ExecuteOptions) -> ExecuteOptions {
        let mut merged = options;
        if merged.model.is_none() {
            merged.model.clone_from(&self.model);
        }
        if merged.timeout.is_none() {
            merged.timeout = self.timeout_ms.map(Duration::from_millis);
        }
        if merged.log_dir.is_none() {
            merged.log_dir.clone_from(&self.log_dir);
        }
        if merged.permission_mode.is_none() {
            merged.permission_mode = self.permission_mode;
        }
        for (key, value) in &self.env {
            merged
                .env
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        merged
    }
}

/// Top-level SDK configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Backend used when none is selected explicitly.
    pub backend: Backend,
    pub claude: AdapterConfig,
    pub codex: AdapterConfig,
    pub gemini: AdapterConfig,
}

impl SdkConfig {
    /// Adapter defaults for `backend`.
    #[must_use]
    pub fn adapter(&self, backend: Backend) -> &AdapterConfig {
        match backend {
            Backend::Claude => &self.claude,
            Backend::Codex => &self.codex,
            Backend::Gemini => &self.gemini,
        }
    }
}
