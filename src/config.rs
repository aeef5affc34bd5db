use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow, bail};

use crate::{availability::MonitorSettings, intake::IntakeLimits};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 4000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 180;
const DEFAULT_STATUS_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WORKSPACE_IDLE_MINUTES: u64 = 30;

/// Runtime configuration for the receipt client, sourced from the environment.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub backend_base_url: String,
    pub port: u16,
    pub notion_auth_url: Option<String>,
    pub intake: IntakeLimits,
    pub monitor: MonitorSettings,
    pub workspace_idle: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_base_url = lookup("RECEIPT_BACKEND_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("RECEIPT_BACKEND_URL env var is missing"))?;

        if !backend_base_url.starts_with("http://") && !backend_base_url.starts_with("https://") {
            bail!("RECEIPT_BACKEND_URL must be an http(s) URL, got `{backend_base_url}`");
        }

        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let notion_auth_url = lookup("NOTION_AUTH_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let max_bytes = parse_or(&lookup, "MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?;
        let max_dimension = parse_or(&lookup, "MAX_IMAGE_DIMENSION", DEFAULT_MAX_IMAGE_DIMENSION)?;
        if max_bytes == 0 || max_dimension == 0 {
            bail!("image limits must be greater than zero");
        }

        let poll_interval = parse_or(&lookup, "STATUS_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let timeout = parse_or(&lookup, "STATUS_TIMEOUT_SECS", DEFAULT_STATUS_TIMEOUT_SECS)?;
        let request_timeout = parse_or(
            &lookup,
            "STATUS_REQUEST_TIMEOUT_SECS",
            DEFAULT_STATUS_REQUEST_TIMEOUT_SECS,
        )?;
        if poll_interval == 0 {
            bail!("STATUS_POLL_INTERVAL_SECS must be greater than zero");
        }

        let idle_minutes = parse_or(&lookup, "WORKSPACE_IDLE_MINUTES", DEFAULT_WORKSPACE_IDLE_MINUTES)?;

        Ok(Self {
            backend_base_url,
            port,
            notion_auth_url,
            intake: IntakeLimits {
                max_bytes,
                max_width: max_dimension,
                max_height: max_dimension,
            },
            monitor: MonitorSettings {
                poll_interval: Duration::from_secs(poll_interval),
                timeout: Duration::from_secs(timeout),
                request_timeout: Duration::from_secs(request_timeout),
            },
            workspace_idle: Duration::from_secs(idle_minutes * 60),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: `{raw}`")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_backend_is_set() {
        let config =
            ClientConfig::from_lookup(lookup_from(&[("RECEIPT_BACKEND_URL", "http://localhost:5001/")]))
                .expect("config");

        assert_eq!(config.backend_base_url, "http://localhost:5001");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.intake.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.intake.max_width, 4000);
        assert_eq!(config.intake.max_height, 4000);
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(5));
        assert_eq!(config.monitor.timeout, Duration::from_secs(180));
        assert!(config.notion_auth_url.is_none());
    }

    #[test]
    fn missing_backend_url_is_an_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("RECEIPT_BACKEND_URL"));
    }

    #[test]
    fn rejects_non_http_backend_url() {
        assert!(ClientConfig::from_lookup(lookup_from(&[("RECEIPT_BACKEND_URL", "localhost:5001")])).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("RECEIPT_BACKEND_URL", "https://receipts.example.com"),
            ("PORT", "9000"),
            ("MAX_IMAGE_DIMENSION", "2000"),
            ("STATUS_POLL_INTERVAL_SECS", "2"),
            ("NOTION_AUTH_URL", "https://receipts.example.com/notion_login"),
        ]))
        .expect("config");

        assert_eq!(config.port, 9000);
        assert_eq!(config.intake.max_width, 2000);
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(2));
        assert_eq!(
            config.notion_auth_url.as_deref(),
            Some("https://receipts.example.com/notion_login")
        );
    }

    #[test]
    fn invalid_numbers_report_the_key() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("RECEIPT_BACKEND_URL", "http://localhost:5001"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
