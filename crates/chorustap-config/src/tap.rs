use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "chorustap.toml";

/// Starter config written by `chorustap init`.
pub const TEMPLATE: &str = r#"# chorustap configuration

# Chorus API token. ${VAR} references are expanded from the environment
# (and from a .env file, if present).
auth_token = "${CHORUS_AUTH_TOKEN}"

# Where to start when a stream has no bookmark yet.
start_date = "2024-01-01T00:00:00Z"

# api_url = "https://chorus.ai"

# Streams to sync. Omit to sync all of them.
# streams = ["engagements", "scorecards", "emails"]

[state]
backend = "file"
path = "state.json"
flush_every = 100
"#;

/// Tap configuration as parsed from chorustap.toml.
#[derive(Debug, Deserialize)]
pub struct TapConfig {
    /// Chorus API token; may reference `${VAR}`.
    #[serde(default)]
    pub auth_token: String,
    /// Start date used when no bookmark exists.
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Streams to sync. Empty means all.
    #[serde(default)]
    pub streams: Vec<String>,
    #[serde(default)]
    pub state: StateConfig,
}

/// Bookmark persistence configuration.
#[derive(Debug, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackend,
    /// Defaults to `state.json` or `state.db` depending on the backend.
    #[serde(default)]
    pub path: Option<String>,
    /// Flush bookmarks after this many emitted records.
    #[serde(default = "default_flush_every")]
    pub flush_every: i64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            path: None,
            flush_every: default_flush_every(),
        }
    }
}

fn default_flush_every() -> i64 {
    100
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// Singer-style JSON state file.
    #[default]
    File,
    Sqlite,
}

impl StateBackend {
    pub fn default_path(self) -> &'static str {
        match self {
            StateBackend::File => "state.json",
            StateBackend::Sqlite => "state.db",
        }
    }
}

impl TapConfig {
    /// Parse a tap config from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: TapConfig = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// The auth token with environment references expanded.
    pub fn resolved_auth_token(&self) -> String {
        resolve_env(&self.auth_token)
    }
}

/// Resolve environment variables in a string.
/// Supports ${VAR_NAME} syntax; unset variables expand to "".
pub fn resolve_env(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;

    // Substituted values are not rescanned.
    while let Some(offset) = result[pos..].find("${") {
        let start = pos + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        pos = start + value.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_resolve_env() {
        std::env::set_var("CHORUSTAP_TEST_VAR", "hello");

        assert_eq!(resolve_env("${CHORUSTAP_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env("prefix_${CHORUSTAP_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env("no_vars"), "no_vars");
        assert_eq!(resolve_env("${CHORUSTAP_TEST_UNSET_VAR}"), "");
        assert_eq!(resolve_env("broken ${OPEN"), "broken ${OPEN");

        std::env::remove_var("CHORUSTAP_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_resolve_env_does_not_expand_substituted_values() {
        std::env::set_var("CHORUSTAP_TEST_SELF", "a${CHORUSTAP_TEST_SELF}b");
        std::env::set_var("CHORUSTAP_TEST_OTHER", "x");

        assert_eq!(
            resolve_env("${CHORUSTAP_TEST_SELF}-${CHORUSTAP_TEST_OTHER}"),
            "a${CHORUSTAP_TEST_SELF}b-x"
        );

        std::env::remove_var("CHORUSTAP_TEST_SELF");
        std::env::remove_var("CHORUSTAP_TEST_OTHER");
    }

    #[test]
    fn test_parse_full() {
        let config = TapConfig::parse(
            r#"
            auth_token = "abc"
            start_date = "2024-01-01T00:00:00Z"
            api_url = "https://chorus.example"
            streams = ["emails"]

            [state]
            backend = "sqlite"
            path = "tap.db"
            flush_every = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.auth_token, "abc");
        assert_eq!(config.streams, vec!["emails".to_string()]);
        assert_eq!(config.state.backend, StateBackend::Sqlite);
        assert_eq!(config.state.path.as_deref(), Some("tap.db"));
        assert_eq!(config.state.flush_every, 10);
    }

    #[test]
    fn test_parse_defaults() {
        let config = TapConfig::parse(
            r#"
            auth_token = "abc"
            start_date = "2024-01-01T00:00:00Z"
            "#,
        )
        .unwrap();

        assert!(config.api_url.is_none());
        assert!(config.streams.is_empty());
        assert_eq!(config.state.backend, StateBackend::File);
        assert_eq!(config.state.flush_every, 100);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = TapConfig::parse(
            r#"
            auth_token = "abc"
            start_date = "2024-01-01T00:00:00Z"
            [state]
            backend = "redis"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = TapConfig::load(dir.path().join(CONFIG_FILE));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_template_parses() {
        let config = TapConfig::parse(TEMPLATE).unwrap();
        assert_eq!(config.auth_token, "${CHORUS_AUTH_TOKEN}");
        assert_eq!(config.state.backend, StateBackend::File);
    }
}
