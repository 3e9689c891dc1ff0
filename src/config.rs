use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULT_S3_REGION: &str = "us-east-1";
const DEFAULT_S3_ENDPOINT: &str = "https://s3.amazonaws.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing environment variable: {0}")]
    MissingVar(&'static str),

    #[error("config value {0} is empty")]
    Empty(&'static str),

    #[error("config value {key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Settings for one process run. Keys match the upper-case names used in
/// `config.json` and in the environment.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub menu_src_url: String,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_bucket: String,
    #[serde(default = "default_s3_region")]
    pub s3_region: String,
    #[serde(default = "default_s3_endpoint")]
    pub s3_endpoint: String,
    pub slack_api_token: String,
    pub slack_channel: String,
}

fn default_s3_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

fn default_s3_endpoint() -> String {
    DEFAULT_S3_ENDPOINT.to_string()
}

// Credentials stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("menu_src_url", &self.menu_src_url)
            .field("s3_access_key_id", &"<redacted>")
            .field("s3_secret_access_key", &"<redacted>")
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("slack_api_token", &"<redacted>")
            .field("slack_channel", &self.slack_channel)
            .finish()
    }
}

impl Config {
    /// Loads config from `path` if given, else from `config.json` in the working
    /// directory if it exists, else from environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!(target: "config", "No config file found; reading environment");
                Self::from_env()?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(target: "config", path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| lookup(key).ok_or(ConfigError::MissingVar(key));

        Ok(Self {
            menu_src_url: require("MENU_SRC_URL")?,
            s3_access_key_id: require("S3_ACCESS_KEY_ID")?,
            s3_secret_access_key: require("S3_SECRET_ACCESS_KEY")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_region: lookup("S3_REGION").unwrap_or_else(default_s3_region),
            s3_endpoint: lookup("S3_ENDPOINT").unwrap_or_else(default_s3_endpoint),
            slack_api_token: require("SLACK_API_TOKEN")?,
            slack_channel: require("SLACK_CHANNEL")?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("MENU_SRC_URL", &self.menu_src_url),
            ("S3_ACCESS_KEY_ID", &self.s3_access_key_id),
            ("S3_SECRET_ACCESS_KEY", &self.s3_secret_access_key),
            ("S3_BUCKET", &self.s3_bucket),
            ("S3_REGION", &self.s3_region),
            ("S3_ENDPOINT", &self.s3_endpoint),
            ("SLACK_API_TOKEN", &self.slack_api_token),
            ("SLACK_CHANNEL", &self.slack_channel),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Empty(*key));
        }

        for (key, value) in [
            ("MENU_SRC_URL", &self.menu_src_url),
            ("S3_ENDPOINT", &self.s3_endpoint),
        ] {
            url::Url::parse(value).map_err(|source| ConfigError::InvalidUrl { key, source })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn full_env() -> HashMap<&'static str, String> {
        [
            ("MENU_SRC_URL", "https://example.com/dinner.pdf"),
            ("S3_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
            ("S3_BUCKET", "menus"),
            ("SLACK_API_TOKEN", "xoxb-token"),
            ("SLACK_CHANNEL", "#ramen"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    #[test]
    fn reads_environment_with_defaults() {
        let env = full_env();
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
        assert_eq!(config.s3_bucket, "menus");
        assert_eq!(config.s3_region, "us-east-1");
        assert_eq!(config.s3_endpoint, "https://s3.amazonaws.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_environment_variable_is_named() {
        let mut env = full_env();
        env.remove("SLACK_CHANNEL");
        let err = Config::from_lookup(|key| env.get(key).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("SLACK_CHANNEL")));
    }

    #[test]
    fn reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "MENU_SRC_URL": "https://example.com/dinner.pdf",
                "S3_ACCESS_KEY_ID": "AKIDEXAMPLE",
                "S3_SECRET_ACCESS_KEY": "secret",
                "S3_BUCKET": "menus",
                "S3_REGION": "us-west-2",
                "SLACK_API_TOKEN": "xoxb-token",
                "SLACK_CHANNEL": "C0123"
            }}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.s3_region, "us-west-2");
        assert_eq!(config.s3_endpoint, "https://s3.amazonaws.com");
        assert_eq!(config.slack_channel, "C0123");
    }

    #[test]
    fn incomplete_json_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"MENU_SRC_URL": "https://example.com/dinner.pdf"}}"#).unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn explicit_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(dir.path().join("nope.json").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn rejects_empty_and_malformed_values() {
        let mut env = full_env();
        env.insert("S3_BUCKET", "  ".to_string());
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Empty("S3_BUCKET"))));

        let mut env = full_env();
        env.insert("MENU_SRC_URL", "not a url".to_string());
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl {
                key: "MENU_SRC_URL",
                ..
            })
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let env = full_env();
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("xoxb-token"));
        assert!(!debug.contains("AKIDEXAMPLE"));
        assert!(debug.contains("menus"));
    }
}
