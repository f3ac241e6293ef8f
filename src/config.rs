//! Process configuration loaded from TOML.
//!
//! Every section is `#[serde(default)]`, so a missing file or missing keys
//! yield defaults. Configuration is constructed once at startup and passed
//! explicitly to the dispatcher and server.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quarry_search::{MediaConfig, SearchConfig};
use serde::{Deserialize, Serialize};

use crate::credentials::{CredentialRef, CredentialStore};
use crate::error::{QuarryError, Result};

/// Name of the search capability exposed to the conversation engine.
pub const EXTREME_SEARCH: &str = "extreme_search";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "QUARRY_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Search aggregation.
    pub search: SearchConfig,
    /// Media validation.
    pub media: MediaConfig,
    /// Credential name → reference.
    pub credentials: BTreeMap<String, CredentialRef>,
    /// Group name → enabled capability names.
    pub groups: GroupsConfig,
    /// Tool dispatch.
    pub dispatch: DispatchConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port; `0` picks a free port.
    pub port: u16,
    /// Let `/relay` reach loopback, private and link-local hosts.
    pub relay_allow_internal: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8787,
            relay_allow_internal: false,
        }
    }
}

/// Mapping from conversation group to enabled capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupsConfig(pub BTreeMap<String, Vec<String>>);

impl Default for GroupsConfig {
    fn default() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert("web".to_owned(), vec![EXTREME_SEARCH.to_owned()]);
        groups.insert("academic".to_owned(), vec![EXTREME_SEARCH.to_owned()]);
        Self(groups)
    }
}

/// Tool dispatch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on one tool call, in seconds.
    pub tool_timeout_secs: u64,
    /// Credentials required in addition to the providers' own
    /// (e.g. the upstream model's key).
    pub extra_required_credentials: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            extra_required_credentials: Vec::new(),
        }
    }
}

impl QuarryConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| QuarryError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from `path` if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| QuarryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the config path: `$QUARRY_CONFIG`, else
    /// `$XDG_CONFIG_HOME/quarry/config.toml`, else the platform config dir.
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            PathBuf::from(path)
        } else if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("quarry").join("config.toml")
        } else if let Some(config) = dirs::config_dir() {
            config.join("quarry").join("config.toml")
        } else {
            PathBuf::from("/tmp/quarry-config/config.toml")
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.media.validate()?;
        if self.dispatch.tool_timeout_secs == 0 {
            return Err(QuarryError::Config(
                "dispatch.tool_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(QuarryError::Config("server.host must not be empty".into()));
        }
        for (group, tools) in &self.groups.0 {
            if let Some(blank) = tools.iter().find(|t| t.trim().is_empty()) {
                return Err(QuarryError::Config(format!(
                    "group '{group}' lists an empty capability name {blank:?}"
                )));
            }
        }
        Ok(())
    }

    /// Credential store over the `[credentials]` table.
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_search::ProviderId;

    #[test]
    fn defaults_are_valid() {
        let config = QuarryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.dispatch.tool_timeout_secs, 30);
        assert_eq!(config.search.providers, vec![ProviderId::Tavily, ProviderId::Exa]);
        assert_eq!(config.groups.0["web"], vec![EXTREME_SEARCH.to_owned()]);
        assert_eq!(config.groups.0["academic"], vec![EXTREME_SEARCH.to_owned()]);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[search]
providers = ["exa"]
max_merged_results = 7

[media]
relay_base_url = "http://127.0.0.1:9000"

[credentials]
TAVILY_API_KEY = "tvly-abc"
EXA_API_KEY = { env = "MY_EXA" }

[groups]
research = ["extreme_search"]
"#,
        )
        .expect("write");

        let config = QuarryConfig::from_file(&path).expect("load");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.search.providers, vec![ProviderId::Exa]);
        assert_eq!(config.search.max_merged_results, 7);
        assert_eq!(config.search.timeout_seconds, 8);
        assert_eq!(config.media.direct_timeout_ms, 5_000);
        assert_eq!(
            config.credentials["EXA_API_KEY"],
            CredentialRef::Env { var: "MY_EXA".into() }
        );
        assert!(config.groups.0.contains_key("research"));
        assert!(!config.groups.0.contains_key("web"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = QuarryConfig::load_or_default(&dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(config.server.port, 8787);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").expect("write");
        let err = QuarryConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, QuarryError::Config(_)));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = QuarryConfig::default();
        config.dispatch.extra_required_credentials = vec!["XAI_API_KEY".into()];
        config.save_to_file(&path).expect("save");

        let loaded = QuarryConfig::from_file(&path).expect("load");
        assert_eq!(loaded.dispatch, config.dispatch);
        assert_eq!(loaded.groups, config.groups);
    }

    #[test]
    fn validation_rejects_bad_sections() {
        let mut config = QuarryConfig::default();
        config.dispatch.tool_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = QuarryConfig::default();
        config.media.proxy_timeout_ms = config.media.direct_timeout_ms + 1;
        assert!(config.validate().is_err());

        let mut config = QuarryConfig::default();
        config.search.providers.clear();
        assert!(config.validate().is_err());

        let mut config = QuarryConfig::default();
        config.groups.0.insert("web".into(), vec![" ".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = QuarryConfig::default_config_path();
        assert!(path.to_string_lossy().ends_with(".toml"));
    }
}
