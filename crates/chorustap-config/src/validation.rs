use std::path::PathBuf;

use chorustap_core::{CursorValue, Registry, DEFAULT_API_URL};
use chrono::DateTime;

use crate::error::{ConfigError, ConfigResult};
use crate::tap::{StateBackend, TapConfig};

/// Validated, environment-resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub auth_token: String,
    /// Floor cursor for streams without a bookmark.
    pub start_date: CursorValue,
    pub api_url: String,
    /// Selected stream names; empty means all.
    pub streams: Vec<String>,
    pub state: StateSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSettings {
    pub backend: StateBackend,
    pub path: PathBuf,
    pub flush_every: u64,
}

/// Validate a tap config against the stream registry.
pub fn validate(config: &TapConfig, registry: &Registry) -> ConfigResult<Settings> {
    let auth_token = config.resolved_auth_token();
    if auth_token.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "auth_token".into(),
        });
    }

    let start_date = validate_start_date(&config.start_date)?;
    let api_url = validate_api_url(config.api_url.as_deref())?;
    validate_streams(&config.streams, registry)?;
    let state = state_settings(config)?;

    Ok(Settings {
        auth_token,
        start_date,
        api_url,
        streams: config.streams.clone(),
        state,
    })
}

fn validate_start_date(value: &str) -> ConfigResult<CursorValue> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingField {
            field: "start_date".into(),
        });
    }
    DateTime::parse_from_rfc3339(value).map_err(|_| ConfigError::InvalidStartDate {
        value: value.to_string(),
    })?;
    Ok(CursorValue::text(value))
}

fn validate_api_url(value: Option<&str>) -> ConfigResult<String> {
    let Some(value) = value else {
        return Ok(DEFAULT_API_URL.to_string());
    };
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(ConfigError::InvalidApiUrl {
            value: value.to_string(),
        });
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn validate_streams(names: &[String], registry: &Registry) -> ConfigResult<()> {
    if let Some(unknown) = names.iter().find(|n| registry.get(n).is_none()) {
        let known: Vec<&str> = registry.discover().iter().map(|s| s.name.as_str()).collect();
        return Err(ConfigError::UnknownStream {
            name: unknown.clone(),
            known: known.join(", "),
        });
    }
    Ok(())
}

/// Resolve the state backend settings alone (no auth token required).
pub fn state_settings(config: &TapConfig) -> ConfigResult<StateSettings> {
    let state = &config.state;
    if state.flush_every <= 0 {
        return Err(ConfigError::InvalidFlushEvery(state.flush_every));
    }

    let path = state
        .path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(state.backend.default_path());

    Ok(StateSettings {
        backend: state.backend,
        path: PathBuf::from(path),
        flush_every: state.flush_every as u64,
    })
}
