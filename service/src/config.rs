use loyalty_parser::AliasTable;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_LOG_FILTER: &str = "loyalty_service=debug,tower_http=debug";
const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read alias file {path}: {source}")]
    AliasFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid alias file {path}: {source}")]
    AliasFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Alias tables used by the handlers
#[derive(Debug, Clone, Deserialize)]
pub struct AliasConfig {
    #[serde(default = "AliasTable::contact_default")]
    pub contact: AliasTable,
    #[serde(default = "AliasTable::inventory_default")]
    pub inventory: AliasTable,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            contact: AliasTable::contact_default(),
            inventory: AliasTable::inventory_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Admin endpoints reject every request when unset
    pub admin_token: Option<String>,
    pub log_filter: String,
    pub body_limit: usize,
    pub aliases: AliasConfig,
}

impl ServiceConfig {
    /// Load from the process environment, after applying any `.env` file.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an env-var lookup, so tests can use a plain map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let or_default = |var: &str, default: &str| non_empty(var).unwrap_or_else(|| default.to_string());

        let bind_raw = or_default("LOYALTY_BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: "LOYALTY_BIND_ADDR".to_string(),
                reason: e.to_string(),
            })?;

        let body_limit = match non_empty("LOYALTY_BODY_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidEnvVar {
                    var: "LOYALTY_BODY_LIMIT".to_string(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_BODY_LIMIT,
        };

        let aliases = match non_empty("LOYALTY_ALIASES") {
            Some(path) => load_aliases(PathBuf::from(path))?,
            None => AliasConfig::default(),
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(or_default("LOYALTY_DATA_DIR", DEFAULT_DATA_DIR)),
            admin_token: non_empty("ADMIN_TOKEN"),
            log_filter: or_default("LOYALTY_LOG", DEFAULT_LOG_FILTER),
            body_limit,
            aliases,
        })
    }
}

fn load_aliases(path: PathBuf) -> Result<AliasConfig, ConfigError> {
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::AliasFile {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::AliasFormat { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.admin_token, None);
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
        assert_eq!(config.aliases.contact, AliasTable::contact_default());
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("LOYALTY_BIND_ADDR", "0.0.0.0:9000"),
            ("LOYALTY_DATA_DIR", "/srv/blobs"),
            ("ADMIN_TOKEN", "s3cret"),
            ("LOYALTY_BODY_LIMIT", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("/srv/blobs"));
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.body_limit, 1024);
    }

    #[test]
    fn test_blank_admin_token_is_unset() {
        let config = ServiceConfig::from_lookup(lookup_from(&[("ADMIN_TOKEN", "  ")])).unwrap();
        assert_eq!(config.admin_token, None);
    }

    #[test]
    fn test_invalid_values() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("LOYALTY_BIND_ADDR", "nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "LOYALTY_BIND_ADDR"));

        let err = ServiceConfig::from_lookup(lookup_from(&[("LOYALTY_BODY_LIMIT", "big")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "LOYALTY_BODY_LIMIT"));
    }

    #[test]
    fn test_alias_file_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(
            &path,
            r#"{"contact":{"fields":[{"field":"last","aliases":["Surname"]}]}}"#,
        )
        .unwrap();

        let config = ServiceConfig::from_lookup(lookup_from(&[(
            "LOYALTY_ALIASES",
            path.to_str().unwrap(),
        )]))
        .unwrap();
        assert_eq!(config.aliases.contact.fields.len(), 1);
        assert_eq!(config.aliases.inventory, AliasTable::inventory_default());
    }

    #[test]
    fn test_missing_alias_file() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("LOYALTY_ALIASES", "/nonexistent/aliases.json")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::AliasFile { .. }));
    }
}
