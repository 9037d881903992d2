use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::audit::{self, AuditLog};
use crate::error::{Result, StsKeepError};
use crate::expiry::ExpiryPolicy;
use crate::store::Domain;

/// Configuration file format (e.g. `~/.stskeep/stskeep.toml`).
///
/// ```toml
/// [refresh]
/// safety_margin = "5m"
/// domain = "global"
///
/// [audit]
/// enabled = true
/// path = "/var/lib/stskeep/refresh-audit.log"
/// key_env = "STSKEEP_AUDIT_KEY"
///
/// [log]
/// filter = "stskeep=debug"
/// json = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// How long before actual expiry a token is renewed ("300s", "5m", ...).
    #[serde(default = "default_safety_margin")]
    pub safety_margin: String,
    /// Store domain in which refreshed credentials are replaced.
    #[serde(default = "default_domain")]
    pub domain: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            safety_margin: default_safety_margin(),
            domain: default_domain(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log file location; `~/.stskeep/refresh-audit.log` when unset.
    pub path: Option<String>,
    /// Environment variable holding the audit key material.
    #[serde(default = "default_audit_key_env")]
    pub key_env: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            key_env: default_audit_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `STSKEEP_LOG` overrides it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_safety_margin() -> String {
    "5m".to_string()
}

fn default_domain() -> String {
    "global".to_string()
}

fn default_audit_key_env() -> String {
    "STSKEEP_AUDIT_KEY".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load config from a path. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| StsKeepError::InvalidConfig(e.to_string()))?;
        config.expiry_policy()?;
        Ok(config)
    }

    /// Save config to a path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StsKeepError::Serialization(format!("Config serialize error: {}", e)))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn expiry_policy(&self) -> Result<ExpiryPolicy> {
        let margin = parse_duration_secs(&self.refresh.safety_margin)?;
        Ok(ExpiryPolicy::new(margin))
    }

    pub fn domain(&self) -> Domain {
        Domain::new(self.refresh.domain.clone())
    }
}

impl AuditConfig {
    /// Open the configured audit log. `None` when disabled, or when the key
    /// variable is unset (logged, since refreshes then go unaudited).
    pub fn open(&self) -> Result<Option<AuditLog>> {
        if !self.enabled {
            return Ok(None);
        }
        let Ok(material) = std::env::var(&self.key_env) else {
            warn!(key_env = %self.key_env, "Audit enabled but key variable unset; refresh audit disabled");
            return Ok(None);
        };
        let path = match &self.path {
            Some(p) => std::path::PathBuf::from(p),
            None => audit::default_audit_path().ok_or_else(|| {
                StsKeepError::InvalidConfig("Could not determine home directory for audit log".into())
            })?,
        };
        let material = zeroize::Zeroizing::new(material);
        AuditLog::new(path, material.as_bytes()).map(Some)
    }
}

/// Parse a duration string like "300s", "5m", "1h" into whole seconds.
pub fn parse_duration_secs(s: &str) -> Result<i64> {
    let duration = humantime::parse_duration(s)
        .map_err(|e| StsKeepError::InvalidConfig(format!("Invalid duration '{}': {}", s, e)))?;
    i64::try_from(duration.as_secs())
        .map_err(|_| StsKeepError::InvalidConfig(format!("Duration out of range: {}", s)))
}
