//! Workspace configuration: loaded from `.sunwell/config.toml` if
//! present, overridden by CLI flags and environment variables (clap's
//! `env` feature reads the same names this struct's defaults use).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sunwell_types::{Risk, TrustLevel, TrustZone};

fn default_trust_level() -> TrustLevel {
    TrustLevel::Guarded
}

fn default_max_spawn_depth() -> u32 {
    2
}

fn default_goal_timeout_secs() -> u64 {
    30 * 60
}

fn default_converge_max_iterations() -> u32 {
    10
}

/// A trust zone as authored in TOML; converted to `sunwell_types::TrustZone`
/// at load time so the rest of the core never depends on this crate's
/// serialization shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustZoneEntry {
    pub glob: String,
    pub risk_override: Risk,
    #[serde(default)]
    pub allowed_in_autonomous: bool,
    pub reason: String,
}

impl From<TrustZoneEntry> for TrustZone {
    fn from(entry: TrustZoneEntry) -> Self {
        TrustZone {
            glob: entry.glob,
            risk_override: entry.risk_override,
            allowed_in_autonomous: entry.allowed_in_autonomous,
            reason: entry.reason,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    pub lint: Option<String>,
    pub type_check: Option<String>,
    pub test: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfigEntry {
    pub id: Option<String>,
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub default_model: Option<String>,
}

/// The workspace-level config singleton. Every field has a sensible
/// default so a bare workspace with no `.sunwell/config.toml` still runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SunwellConfig {
    #[serde(default = "default_trust_level")]
    pub trust_level: TrustLevel,
    #[serde(default = "default_max_spawn_depth")]
    pub max_spawn_depth: u32,
    #[serde(default = "default_goal_timeout_secs")]
    pub goal_timeout_secs: u64,
    #[serde(default = "default_converge_max_iterations")]
    pub converge_max_iterations: u32,
    #[serde(default)]
    pub auto_resume: bool,
    #[serde(default)]
    pub gates: GateConfig,
    #[serde(default)]
    pub trust_zones: Vec<TrustZoneEntry>,
    #[serde(default)]
    pub provider: ProviderConfigEntry,
}

impl Default for SunwellConfig {
    fn default() -> Self {
        Self {
            trust_level: default_trust_level(),
            max_spawn_depth: default_max_spawn_depth(),
            goal_timeout_secs: default_goal_timeout_secs(),
            converge_max_iterations: default_converge_max_iterations(),
            auto_resume: true,
            gates: GateConfig::default(),
            trust_zones: Vec::new(),
            provider: ProviderConfigEntry::default(),
        }
    }
}

impl SunwellConfig {
    pub fn path_for(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".sunwell").join("config.toml")
    }

    /// Loads `.sunwell/config.toml` if it exists, otherwise returns the
    /// default configuration. A present-but-unparseable file is an
    /// integrity error, not a silent fallback.
    pub async fn load(workspace_root: &Path) -> anyhow::Result<Self> {
        let path = Self::path_for(workspace_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn trust_zones(&self) -> Vec<TrustZone> {
        self.trust_zones.iter().cloned().map(TrustZone::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SunwellConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.max_spawn_depth, default_max_spawn_depth());
        assert!(config.trust_zones.is_empty());
    }

    #[tokio::test]
    async fn loads_trust_zones_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join(".sunwell")).await.unwrap();
        tokio::fs::write(
            SunwellConfig::path_for(dir.path()),
            r#"
            trust_level = "full"

            [[trust_zones]]
            glob = "secrets/*"
            risk_override = "forbidden"
            reason = "credential material"
            "#,
        )
        .await
        .unwrap();

        let config = SunwellConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.trust_level, TrustLevel::Full);
        assert_eq!(config.trust_zones().len(), 1);
        assert_eq!(config.trust_zones()[0].risk_override, Risk::Forbidden);
    }
}
