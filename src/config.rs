use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context as AnyhowContext};
use http::Uri;
use serde::Deserialize;
use tracing::warn;

use crate::db::DEFAULT_STORE_PATH;

////////////////////////////////////////////////////////////////////////////////

pub(crate) const DEFAULT_PORT: u16 = 3001;
pub(crate) const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_port")]
    pub(crate) port: u16,
    #[serde(default = "default_allowed_origins")]
    pub(crate) allowed_origins: Vec<String>,
    #[serde(default)]
    pub(crate) store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub(crate) path: PathBuf,
    #[serde(default = "default_true")]
    pub(crate) seed_default_room: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            seed_default_room: true,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_allowed_origins() -> Vec<String> {
    vec![DEFAULT_ALLOWED_ORIGIN.to_owned()]
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_true() -> bool {
    true
}

////////////////////////////////////////////////////////////////////////////////

/// Loads the optional `App` config file merged with `APP__`-prefixed
/// environment variables, then layers the plain environment contract
/// (`PORT`, `NEXT_PUBLIC_WS_URL`, `ALLOWED_ORIGINS`, `NODE_ENV`) on top.
/// Invalid values in the latter are fatal.
pub(crate) fn load() -> anyhow::Result<Config> {
    let mut parser = config::Config::default();
    parser.merge(config::File::with_name("App").required(false))?;
    parser.merge(config::Environment::with_prefix("APP").separator("__"))?;

    let mut config = parser.try_into::<Config>()?;
    config.apply_overrides(|name| env::var(name).ok())?;
    Ok(config)
}

impl Config {
    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        match var("PORT") {
            Some(raw) => {
                let port = raw
                    .parse::<u16>()
                    .ok()
                    .filter(|port| *port > 0)
                    .ok_or_else(|| anyhow!("PORT must be in 1..=65535, got '{}'", raw))?;

                self.port = port;
            }
            None => warn!("PORT is not set, using {}", self.port),
        }

        match var("NEXT_PUBLIC_WS_URL") {
            Some(raw) => {
                validate_origin(&raw)?;
                self.allowed_origins = vec![raw];
            }
            None => warn!(
                "NEXT_PUBLIC_WS_URL is not set, allowing {}",
                self.allowed_origins.join(", ")
            ),
        }

        if let Some(raw) = var("ALLOWED_ORIGINS") {
            let origins = raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();

            for origin in &origins {
                validate_origin(origin)?;
            }

            if origins.is_empty() {
                return Err(anyhow!("ALLOWED_ORIGINS is set but contains no origins"));
            }

            self.allowed_origins = origins;
        }

        if let Some(node_env) = var("NODE_ENV") {
            self.store.seed_default_room = node_env != "production";
        }

        Ok(())
    }
}

fn validate_origin(origin: &str) -> anyhow::Result<()> {
    let uri = origin
        .parse::<Uri>()
        .with_context(|| format!("malformed origin URL '{}'", origin))?;

    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(anyhow!("origin URL '{}' must carry a scheme and host", origin));
    }

    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn apply(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<_, _> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| map.get(name).cloned())?;
        Ok(config)
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = apply(&[]).expect("Failed to load");

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.allowed_origins, vec![DEFAULT_ALLOWED_ORIGIN]);
        assert!(config.store.seed_default_room);
    }

    #[test]
    fn port_and_origin_are_taken_from_the_environment() {
        let config = apply(&[
            ("PORT", "8080"),
            ("NEXT_PUBLIC_WS_URL", "https://class.example.org"),
        ])
        .expect("Failed to load");

        assert_eq!(config.port, 8080);
        assert_eq!(config.allowed_origins, vec!["https://class.example.org"]);
    }

    #[test]
    fn invalid_port_is_fatal() {
        assert!(apply(&[("PORT", "0")]).is_err());
        assert!(apply(&[("PORT", "70000")]).is_err());
        assert!(apply(&[("PORT", "yes")]).is_err());
    }

    #[test]
    fn malformed_origin_is_fatal() {
        assert!(apply(&[("NEXT_PUBLIC_WS_URL", "not a url")]).is_err());
        assert!(apply(&[("NEXT_PUBLIC_WS_URL", "localhost")]).is_err());
    }

    #[test]
    fn allowed_origins_override_the_single_origin() {
        let config = apply(&[
            ("NEXT_PUBLIC_WS_URL", "http://localhost:3000"),
            (
                "ALLOWED_ORIGINS",
                "https://a.example.org, https://b.example.org",
            ),
        ])
        .expect("Failed to load");

        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example.org", "https://b.example.org"]
        );
    }

    #[test]
    fn production_disables_seeding() {
        let config = apply(&[("NODE_ENV", "production")]).expect("Failed to load");
        assert!(!config.store.seed_default_room);
    }
}
