use std::time::Duration;

use anyhow::{Context, bail};

use civic_api::geocode::{LOCATIONIQ_BASE_URL, MAPBOX_BASE_URL};
use civic_gateway::socket_url_from_api;

/// Values shipped in sample `.env` files that must never reach a provider.
const PLACEHOLDER_KEYS: &[&str] = &[
    "change-me",
    "your-mapbox-token",
    "your-locationiq-key",
    "pk.your-token-here",
];

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderKey {
    pub key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub socket_url: String,
    /// Whether `socket_url` was set explicitly or derived from `api_url`
    socket_explicit: bool,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub http_timeout: Duration,
    pub mapbox: Option<ProviderKey>,
    pub locationiq: Option<ProviderKey>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = var("CIVIC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let (socket_url, socket_explicit) = match var("CIVIC_SOCKET_URL") {
            Some(url) => (url, true),
            None => (socket_url_from_api(&api_url)?, false),
        };

        let http_timeout = match var("CIVIC_HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("CIVIC_HTTP_TIMEOUT_SECS is not a number: {}", v))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let mapbox = provider(&var, "CIVIC_MAPBOX_TOKEN", "CIVIC_MAPBOX_URL", MAPBOX_BASE_URL)?;
        let locationiq = provider(
            &var,
            "CIVIC_LOCATIONIQ_KEY",
            "CIVIC_LOCATIONIQ_URL",
            LOCATIONIQ_BASE_URL,
        )?;

        Ok(Self {
            api_url,
            socket_url,
            socket_explicit,
            token: var("CIVIC_TOKEN"),
            user_id: var("CIVIC_USER_ID"),
            http_timeout,
            mapbox,
            locationiq,
        })
    }

    /// Point at another API. A derived socket URL follows it.
    pub fn with_api_url(mut self, api_url: String) -> anyhow::Result<Self> {
        if !self.socket_explicit {
            self.socket_url = socket_url_from_api(&api_url)?;
        }
        self.api_url = api_url;
        Ok(self)
    }
}

fn provider(
    var: &impl Fn(&str) -> Option<String>,
    key_var: &str,
    url_var: &str,
    default_url: &str,
) -> anyhow::Result<Option<ProviderKey>> {
    let Some(key) = var(key_var) else {
        return Ok(None);
    };
    if PLACEHOLDER_KEYS.contains(&key.as_str()) {
        bail!("{} is still a placeholder; set a real key or unset it", key_var);
    }
    Ok(Some(ProviderKey {
        key,
        base_url: var(url_var).unwrap_or_else(|| default_url.into()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.api_url, DEFAULT_API_URL);
        assert_eq!(c.socket_url, "ws://localhost:5000/");
        assert_eq!(c.http_timeout, Duration::from_secs(15));
        assert!(c.token.is_none());
        assert!(c.mapbox.is_none() && c.locationiq.is_none());
    }

    #[test]
    fn socket_url_follows_api_unless_set() {
        let c = config(&[("CIVIC_API_URL", "https://civic.example.org/api")]).unwrap();
        assert_eq!(c.socket_url, "wss://civic.example.org/");

        let c = c.with_api_url("http://10.0.0.2:8080".into()).unwrap();
        assert_eq!(c.socket_url, "ws://10.0.0.2:8080/");

        let c = config(&[("CIVIC_SOCKET_URL", "wss://rt.example.org/")])
            .unwrap()
            .with_api_url("http://10.0.0.2:8080".into())
            .unwrap();
        assert_eq!(c.socket_url, "wss://rt.example.org/");
    }

    #[test]
    fn placeholder_keys_are_rejected() {
        let err = config(&[("CIVIC_MAPBOX_TOKEN", "your-mapbox-token")]).unwrap_err();
        assert!(err.to_string().contains("CIVIC_MAPBOX_TOKEN"));

        let c = config(&[
            ("CIVIC_LOCATIONIQ_KEY", "pk.real"),
            ("CIVIC_LOCATIONIQ_URL", "http://127.0.0.1:9000"),
            ("CIVIC_TOKEN", "  "),
        ])
        .unwrap();
        let liq = c.locationiq.unwrap();
        assert_eq!(liq.key, "pk.real");
        assert_eq!(liq.base_url, "http://127.0.0.1:9000");
        assert!(c.token.is_none());
    }

    #[test]
    fn bad_timeout_is_an_error() {
        assert!(config(&[("CIVIC_HTTP_TIMEOUT_SECS", "soon")]).is_err());
        let c = config(&[("CIVIC_HTTP_TIMEOUT_SECS", "3")]).unwrap();
        assert_eq!(c.http_timeout, Duration::from_secs(3));
    }
}
