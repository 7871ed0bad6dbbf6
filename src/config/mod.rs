//! Identity settings
//!
//! [`Settings`] collects the operator-supplied parts of a service identity.
//! It deserializes from any serde source and can be read from environment
//! variables; applying it to an [`AppBuilder`](crate::AppBuilder) is done
//! with [`AppBuilder::settings`](crate::AppBuilder::settings).

use crate::error::{LifecycleError, Result};
use crate::lifecycle::Signal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "APP_";

/// Operator-supplied identity settings
///
/// Every field is optional; unset fields leave the builder untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub metadata: HashMap<String, String>,
    pub endpoints: Vec<String>,
    pub signals: Option<Vec<Signal>>,
}

impl Settings {
    /// Read settings from the process environment using [`DEFAULT_ENV_PREFIX`]
    pub fn from_env() -> Result<Self> {
        Self::from_vars(DEFAULT_ENV_PREFIX, env::vars())
    }

    /// Read settings from `vars`, considering only keys starting with `prefix`
    ///
    /// Recognized keys (after the prefix): `ID`, `NAME`, `VERSION`,
    /// `ENDPOINTS` (comma separated), `METADATA` (`k=v` pairs, comma
    /// separated) and `SIGNALS` (comma separated names such as `SIGTERM`).
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();

        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(prefix) else {
                continue;
            };
            let value = value.as_ref().trim();

            match key {
                "ID" => settings.id = Some(value.to_string()),
                "NAME" => settings.name = Some(value.to_string()),
                "VERSION" => settings.version = Some(value.to_string()),
                "ENDPOINTS" => settings.endpoints = split_list(value).map(String::from).collect(),
                "METADATA" => settings.metadata = parse_metadata(value)?,
                "SIGNALS" => {
                    let signals = split_list(value)
                        .map(|name| {
                            name.parse::<Signal>().map_err(|_| {
                                LifecycleError::config(format!("unknown signal `{}`", name))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    settings.signals = Some(signals);
                }
                _ => tracing::debug!(key, "ignoring unrecognized setting"),
            }
        }

        Ok(settings)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_metadata(value: &str) -> Result<HashMap<String, String>> {
    split_list(value)
        .map(|pair| -> Result<(String, String)> {
            let (k, v) = pair.split_once('=').ok_or_else(|| {
                LifecycleError::config(format!("metadata entry `{}` is not key=value", pair))
            })?;
            Ok((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars() {
        let vars = [
            ("APP_NAME", "billing"),
            ("APP_VERSION", "v2"),
            ("APP_ENDPOINTS", "http://a:80, grpc://b:9000,"),
            ("APP_METADATA", "zone=eu-1, tier = gold"),
            ("APP_SIGNALS", "SIGTERM,int"),
            ("HOME", "/root"),
        ];
        let settings = Settings::from_vars("APP_", vars).unwrap();

        assert_eq!(settings.id, None);
        assert_eq!(settings.name.as_deref(), Some("billing"));
        assert_eq!(settings.version.as_deref(), Some("v2"));
        assert_eq!(settings.endpoints, vec!["http://a:80", "grpc://b:9000"]);
        assert_eq!(settings.metadata.get("tier").map(String::as_str), Some("gold"));
        assert_eq!(settings.metadata.len(), 2);
        assert_eq!(
            settings.signals,
            Some(vec![Signal::Terminate, Signal::Interrupt])
        );
    }

    #[test]
    fn test_unknown_signal_is_rejected() {
        let err = Settings::from_vars("APP_", [("APP_SIGNALS", "SIGFOO")]).unwrap_err();
        assert_eq!(err, LifecycleError::config("unknown signal `SIGFOO`"));
    }

    #[test]
    fn test_malformed_metadata_is_rejected() {
        let err = Settings::from_vars("SVC_", [("SVC_METADATA", "zone")]).unwrap_err();
        assert!(matches!(err, LifecycleError::Config(_)));
    }

    #[test]
    fn test_deserialize() {
        let settings: Settings = serde_json::from_str(
            r#"{"name": "billing", "signals": ["SIGHUP", "terminate"], "metadata": {"a": "b"}}"#,
        )
        .unwrap();

        assert_eq!(settings.name.as_deref(), Some("billing"));
        assert_eq!(settings.signals, Some(vec![Signal::Hangup, Signal::Terminate]));
        assert!(settings.endpoints.is_empty());
    }
}
