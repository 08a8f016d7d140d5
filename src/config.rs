//! Connection settings for the write client.
//!
//! Settings come from environment variables, optionally seeded from a
//! `.env` file:
//!
//! - `INFLUXDB_SERVER_IP`: host or IP of the store; the URL becomes `https://<ip>:8086`
//! - `INFLUXDB_API_TOKEN`: API token sent as `Authorization: Token <token>`
//! - `INFLUXDB_BUCKET`: destination bucket
//! - `INFLUXDB_ORG`: organization owning the bucket
//! - `INFLUXDB_INSECURE_TLS`: `1`/`true` skips certificate verification (default: off)
//! - `INFLUXDB_PRECISION`: timestamp unit, one of `ns`, `us`, `ms`, `s` (default: `ns`)
//! - `INFLUXDB_TIMEOUT_SECS`: request timeout in seconds (default: 20)
//!
//! Missing variables become empty values. They are reported by
//! [`Config::validate`] but do not stop a [`crate::Writer`] from being built;
//! the store rejects the write instead. An unparsable optional setting falls
//! back to its default and is returned as a warning.

use crate::point::WritePrecision;
use reqwest::Url;
use std::{
    collections::HashMap,
    fmt,
    num::ParseIntError,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const ENV_SERVER_IP: &str = "INFLUXDB_SERVER_IP";
pub const ENV_API_TOKEN: &str = "INFLUXDB_API_TOKEN";
pub const ENV_BUCKET: &str = "INFLUXDB_BUCKET";
pub const ENV_ORG: &str = "INFLUXDB_ORG";
pub const ENV_INSECURE_TLS: &str = "INFLUXDB_INSECURE_TLS";
pub const ENV_PRECISION: &str = "INFLUXDB_PRECISION";
pub const ENV_TIMEOUT_SECS: &str = "INFLUXDB_TIMEOUT_SECS";

pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error reading env file {path}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("{0} is empty")]
    MissingValue(&'static str),
    #[error("invalid server url {0:?}")]
    InvalidUrl(String),
    #[error("invalid value {value:?} for {name}")]
    InvalidFlag { name: &'static str, value: String },
    #[error("invalid write precision")]
    InvalidPrecision(#[from] crate::point::ParsePrecisionError),
    #[error("invalid value for INFLUXDB_TIMEOUT_SECS")]
    InvalidTimeout(#[source] ParseIntError),
}

#[derive(Clone)]
pub struct Config {
    // Base URL of the store, e.g. https://10.0.0.5:8086.
    pub url: String,
    pub token: String,
    pub bucket: String,
    pub org: String,
    // Skips certificate chain and host name verification. Only meant for a
    // self-signed test endpoint whose certificate lacks SANs.
    pub allow_insecure_tls: bool,
    pub precision: WritePrecision,
    // Upper bound on a single blocking write.
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            bucket: String::new(),
            org: String::new(),
            allow_insecure_tls: false,
            precision: WritePrecision::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// The token never shows up in logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("token", &token)
            .field("bucket", &self.bucket)
            .field("org", &self.org)
            .field("allow_insecure_tls", &self.allow_insecure_tls)
            .field("precision", &self.precision)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> (Self, Vec<ConfigError>) {
        Self::from_vars(std::env::vars())
    }

    /// Builds a config from `(name, value)` pairs. When a name repeats, the
    /// last value wins, so chaining env file pairs before process
    /// environment pairs lets the environment override the file.
    ///
    /// Never fails: a bad optional setting keeps its default and the parse
    /// error is returned alongside the config.
    pub fn from_vars<I, K, V>(vars: I) -> (Self, Vec<ConfigError>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |name: &str| vars.get(name).cloned().unwrap_or_default();
        let optional = |name: &str| {
            vars.get(name)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        };

        let mut config = Self {
            url: server_url(&get(ENV_SERVER_IP)),
            token: get(ENV_API_TOKEN),
            bucket: get(ENV_BUCKET),
            org: get(ENV_ORG),
            ..Default::default()
        };
        let mut warnings = vec![];

        if let Some(s) = optional(ENV_INSECURE_TLS) {
            match parse_flag(ENV_INSECURE_TLS, s) {
                Ok(flag) => config.allow_insecure_tls = flag,
                Err(e) => warnings.push(e),
            }
        }
        if let Some(s) = optional(ENV_PRECISION) {
            match s.parse() {
                Ok(precision) => config.precision = precision,
                Err(e) => warnings.push(ConfigError::InvalidPrecision(e)),
            }
        }
        if let Some(s) = optional(ENV_TIMEOUT_SECS) {
            match s.parse() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(e) => warnings.push(ConfigError::InvalidTimeout(e)),
            }
        }

        (config, warnings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingValue("server url"));
        }
        match Url::parse(&self.url) {
            Ok(url) if url.host_str().map_or(false, |h| !h.is_empty()) => {}
            _ => return Err(ConfigError::InvalidUrl(self.url.clone())),
        }
        if self.token.is_empty() {
            return Err(ConfigError::MissingValue(ENV_API_TOKEN));
        }
        if self.bucket.is_empty() {
            return Err(ConfigError::MissingValue(ENV_BUCKET));
        }
        if self.org.is_empty() {
            return Err(ConfigError::MissingValue(ENV_ORG));
        }
        Ok(())
    }
}

pub fn server_url(host: &str) -> String {
    format!("https://{}:{}", host.trim(), DEFAULT_PORT)
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

/// Reads `KEY=VALUE` pairs from an env file without touching the process
/// environment.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>, ConfigError> {
    let path = path.as_ref();
    let env_file_error = |source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };
    dotenvy::from_path_iter(path)
        .map_err(env_file_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(env_file_error)
}

#[cfg(test)]
pub mod tests {
    use std::{io::Write, time::Duration};

    use crate::point::WritePrecision;

    use super::{load_env_file, Config, ConfigError, DEFAULT_TIMEOUT};

    fn full_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("INFLUXDB_SERVER_IP", "10.0.0.5"),
            ("INFLUXDB_API_TOKEN", "secret"),
            ("INFLUXDB_BUCKET", "sensors"),
            ("INFLUXDB_ORG", "home"),
        ]
    }

    fn env_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_from_vars() {
        let (config, warnings) = Config::from_vars(full_vars());
        assert!(warnings.is_empty());
        assert_eq!(config.url, "https://10.0.0.5:8086");
        assert_eq!(config.token, "secret");
        assert_eq!(config.bucket, "sensors");
        assert_eq!(config.org, "home");
        assert!(!config.allow_insecure_tls);
        assert_eq!(config.precision, WritePrecision::Nanoseconds);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_optional_vars() {
        let mut vars = full_vars();
        vars.push(("INFLUXDB_INSECURE_TLS", "TRUE"));
        vars.push(("INFLUXDB_PRECISION", "ms"));
        vars.push(("INFLUXDB_TIMEOUT_SECS", "5"));
        let (config, warnings) = Config::from_vars(vars);
        assert!(warnings.is_empty());
        assert!(config.allow_insecure_tls);
        assert_eq!(config.precision, WritePrecision::Milliseconds);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_bad_timeout_keeps_default() {
        let (config, warnings) = Config::from_vars([
            ("INFLUXDB_SERVER_IP", "10.0.0.5"),
            ("INFLUXDB_TIMEOUT_SECS", "20s"),
        ]);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.url, "https://10.0.0.5:8086");
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], ConfigError::InvalidTimeout(_)));
    }

    #[test]
    fn test_config_bad_optional_vars_keep_defaults() {
        let (config, warnings) = Config::from_vars([
            ("INFLUXDB_INSECURE_TLS", "maybe"),
            ("INFLUXDB_PRECISION", "h"),
            ("INFLUXDB_TIMEOUT_SECS", "-1"),
        ]);
        assert!(!config.allow_insecure_tls);
        assert_eq!(config.precision, WritePrecision::Nanoseconds);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        assert_eq!(warnings.len(), 3);
        assert!(matches!(warnings[0], ConfigError::InvalidFlag { .. }));
        assert!(matches!(warnings[1], ConfigError::InvalidPrecision(_)));
        assert!(matches!(warnings[2], ConfigError::InvalidTimeout(_)));
    }

    #[test]
    fn test_config_missing_vars_are_empty() {
        let (config, warnings) = Config::from_vars(Vec::<(String, String)>::new());
        assert!(warnings.is_empty());
        assert_eq!(config.url, "https://:8086");
        assert!(config.token.is_empty());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_config_validate() {
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::MissingValue(_))
        ));

        let (mut config, _) = Config::from_vars(full_vars());
        config.bucket.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue("INFLUXDB_BUCKET"))
        ));
    }

    #[test]
    fn test_config_last_value_wins() {
        let mut vars = full_vars();
        vars.push(("INFLUXDB_BUCKET", "override"));
        let (config, _) = Config::from_vars(vars);
        assert_eq!(config.bucket, "override");
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let (config, _) = Config::from_vars(full_vars());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("sensors"));
    }

    #[test]
    fn test_load_env_file() {
        let file = env_file(
            "# store settings\n\nINFLUXDB_SERVER_IP=10.0.0.5\nexport INFLUXDB_ORG=\"home \\\"lab\\\"\"\nINFLUXDB_BUCKET='sensors'\nINFLUXDB_API_TOKEN=abc==\n",
        );
        let vars = load_env_file(file.path()).unwrap();
        assert_eq!(
            vars,
            vec![
                ("INFLUXDB_SERVER_IP".to_string(), "10.0.0.5".to_string()),
                ("INFLUXDB_ORG".to_string(), "home \"lab\"".to_string()),
                ("INFLUXDB_BUCKET".to_string(), "sensors".to_string()),
                ("INFLUXDB_API_TOKEN".to_string(), "abc==".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_env_file_inline_comment() {
        let file = env_file("INFLUXDB_BUCKET=sensors # prod bucket\n");
        let vars = load_env_file(file.path()).unwrap();
        let (config, _) = Config::from_vars(vars);
        assert_eq!(config.bucket, "sensors");
    }

    #[test]
    fn test_load_env_file_environment_overrides() {
        let file = env_file("INFLUXDB_SERVER_IP=192.168.1.20\nINFLUXDB_BUCKET=from-file\n");
        let vars = load_env_file(file.path()).unwrap();
        let (config, _) = Config::from_vars(
            vars.into_iter()
                .chain([("INFLUXDB_BUCKET".to_string(), "from-env".to_string())]),
        );
        assert_eq!(config.url, "https://192.168.1.20:8086");
        assert_eq!(config.bucket, "from-env");
    }

    #[test]
    fn test_load_env_file_syntax_error() {
        let file = env_file("A=1\nnot a pair\n");
        let result = load_env_file(file.path());
        assert!(matches!(
            result,
            Err(ConfigError::EnvFile {
                source: dotenvy::Error::LineParse(..),
                ..
            })
        ));
    }

    #[test]
    fn test_load_env_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_env_file(dir.path().join(".env"));
        assert!(matches!(result, Err(ConfigError::EnvFile { .. })));
    }
}
