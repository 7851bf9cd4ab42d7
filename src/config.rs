// src/config.rs

//! Runtime configuration, persisted as JSON next to the other project files.

use crate::core::error::{Error, Result};
use crate::logging::project_directory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub verification: VerificationConfig,
    pub checks: ChecksConfig,
}

/// Settings shared by every outbound HTTP probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Upper bound for one network probe.
    pub probe_timeout_secs: u64,
    /// Upper bound for a whole check category, kept under the caller's
    /// per-invocation wall-clock limit.
    pub step_budget_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "VanguardRS-Sentinel/{} (+ownership-verified security assessment)",
                env!("CARGO_PKG_VERSION")
            ),
            probe_timeout_secs: 10,
            step_budget_secs: 25,
        }
    }
}

impl HttpConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn step_budget(&self) -> Duration {
        Duration::from_secs(self.step_budget_secs)
    }
}

/// Public resolvers queried for DNS-TXT verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicResolver {
    Google,
    Cloudflare,
    Quad9,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub token_prefix: String,
    /// Served as `/.well-known/<well_known_file>.txt`.
    pub well_known_file: String,
    /// Suggested `name` for the meta tag. Any name containing "verify" is accepted.
    pub meta_tag_name: String,
    pub resolvers: Vec<PublicResolver>,
    pub dns_timeout_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            token_prefix: "vanguard-verify-".to_string(),
            well_known_file: "vanguard-verify".to_string(),
            meta_tag_name: "vanguard-verify".to_string(),
            resolvers: vec![PublicResolver::Google, PublicResolver::Cloudflare, PublicResolver::Quad9],
            dns_timeout_secs: 5,
        }
    }
}

impl VerificationConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn well_known_path(&self) -> String {
        format!("/.well-known/{}.txt", self.well_known_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    pub certificate_expiry_warning_days: i64,
    /// Probe well-known sensitive paths such as `/.git/HEAD` with plain GETs.
    pub probe_sensitive_paths: bool,
    pub hsts_min_max_age_secs: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            certificate_expiry_warning_days: 30,
            probe_sensitive_paths: true,
            hsts_min_max_age_secs: 15_552_000,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(&Self::default_config_path())
    }

    /// Defaults are written out only when no file exists. A file that fails to
    /// load is left untouched so the user can fix it.
    pub fn load_or_default_from(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                warn!(error = %e, "Could not write default configuration.");
            }
            return config;
        }

        match Self::load(path) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded configuration.");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults.");
                Self::default()
            }
        }
    }

    pub fn default_config_path() -> PathBuf {
        project_directory()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".").join(".config"))
            .join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "http": { "probe_timeout_secs": 3 } }"#).unwrap();
        assert_eq!(config.http.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.http.step_budget_secs, 25);
        assert_eq!(config.verification.resolvers.len(), 3);
        assert_eq!(config.verification.well_known_path(), "/.well-known/vanguard-verify.txt");
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = std::env::temp_dir().join(format!("vanguard-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join(CONFIG_FILE);
        let mut config = Config::default();
        config.verification.token_prefix = "acme-".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.verification.token_prefix, "acme-");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn broken_config_file_is_left_alone() {
        let dir = std::env::temp_dir().join(format!("vanguard-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join(CONFIG_FILE);
        std::fs::create_dir_all(&dir).unwrap();
        let broken = r#"{ "http": { "probe_timeout_secs": 3, } }"#;
        std::fs::write(&path, broken).unwrap();

        let config = Config::load_or_default_from(&path);
        assert_eq!(config.http.probe_timeout_secs, 10);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_config_file_is_written_with_defaults() {
        let dir = std::env::temp_dir().join(format!("vanguard-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join(CONFIG_FILE);

        let config = Config::load_or_default_from(&path);
        let written = Config::load(&path).unwrap();
        assert_eq!(written.http.probe_timeout_secs, config.http.probe_timeout_secs);
        std::fs::remove_dir_all(dir).ok();
    }
}
