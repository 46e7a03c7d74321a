//! Configuration resolution
//!
//! Each field of [`Config`] is resolved independently from, highest
//! precedence first: an explicit override (CLI flag), a `REPRINT_*`
//! environment variable, the YAML config file at
//! `~/.config/reprint/config.yaml`, and for `credentials` only, the default
//! key file at `~/.config/<app-name>/credentials.json` if it exists.
//!
//! An empty value is treated exactly like an absent one at every layer, so an
//! empty flag never clears a value supplied by a lower layer.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::credentials::default_credentials_path_in;
use crate::error::{Error, Result};

/// Directory name under `~/.config` holding the shared config file
pub const CONFIG_DIR_NAME: &str = "reprint";

/// Conventional config file name
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Prefix of every configuration environment variable
pub const ENV_PREFIX: &str = "REPRINT_";

/// Environment variable naming an alternate config file
pub const ENV_CONFIG_PATH: &str = "REPRINT_CONFIG";

/// A resolvable configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Bucket,
    Prefix,
    Credentials,
    Endpoint,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Bucket,
        Field::Prefix,
        Field::Credentials,
        Field::Endpoint,
    ];

    /// Key used in the config file and as the CLI flag name
    pub const fn name(self) -> &'static str {
        match self {
            Field::Bucket => "bucket",
            Field::Prefix => "prefix",
            Field::Credentials => "credentials",
            Field::Endpoint => "endpoint",
        }
    }

    /// Environment variable bound to this field
    pub fn env_var(self) -> String {
        format!("{ENV_PREFIX}{}", self.name().to_uppercase())
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Override,
    Environment,
    ConfigFile,
    DefaultPath,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Override => "flag",
            Source::Environment => "environment",
            Source::ConfigFile => "config file",
            Source::DefaultPath => "default path",
        })
    }
}

/// Values supplied by a single configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub credentials: Option<String>,
    pub endpoint: Option<String>,
}

impl ConfigLayer {
    /// Parse a YAML config file
    ///
    /// An empty file yields an empty layer; unknown keys are ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse config file {}: {e}", path.display()))
        })
    }

    /// Read the `REPRINT_*` variables through `lookup`
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bucket: lookup(&Field::Bucket.env_var()),
            prefix: lookup(&Field::Prefix.env_var()),
            credentials: lookup(&Field::Credentials.env_var()),
            endpoint: lookup(&Field::Endpoint.env_var()),
        }
    }

    /// The value for `field`, with empty strings reported as absent
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Bucket => &self.bucket,
            Field::Prefix => &self.prefix,
            Field::Credentials => &self.credentials,
            Field::Endpoint => &self.endpoint,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// Explicit values from the caller, typically CLI flags
///
/// `None` and `Some("")` both mean "not supplied".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub values: ConfigLayer,
    /// Application name used to locate the default credential file
    pub app_name: Option<String>,
    /// Config file replacing the conventional location
    pub config_path: Option<PathBuf>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.values.bucket = Some(bucket.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.values.prefix = Some(prefix.into());
        self
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.values.credentials = Some(credentials.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.values.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Whether the caller needs a credential file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialPolicy {
    /// A service-account key must be configured
    #[default]
    Required,
    /// The backend may fall back to ambient credentials
    Optional,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bucket: String,
    pub prefix: String,
    pub credentials: Option<PathBuf>,
    /// Alternate (emulator) endpoint; `None` targets production
    pub endpoint: Option<String>,
    pub app_name: Option<String>,
    /// Source that supplied `credentials`
    pub credentials_source: Option<Source>,
    /// Default credential location for `app_name`, whether or not it exists
    pub default_credentials: Option<PathBuf>,
    /// Config file consulted during resolution
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Check required fields under `policy`
    pub fn validate(&self, policy: CredentialPolicy) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::Config(format!(
                "bucket is required (--bucket, {}, or bucket in {})",
                Field::Bucket.env_var(),
                self.config_path_display()
            )));
        }

        match &self.credentials {
            Some(path) if !path.is_file() => {
                let source = self
                    .credentials_source
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown source".to_string());
                Err(Error::Credentials(format!(
                    "credentials file not found: {} (set via {source})",
                    path.display()
                )))
            }
            Some(_) => Ok(()),
            None if policy == CredentialPolicy::Optional => Ok(()),
            None => {
                let mut hint = format!(
                    "--credentials, {}, credentials in {}",
                    Field::Credentials.env_var(),
                    self.config_path_display()
                );
                if let Some(default) = &self.default_credentials {
                    hint.push_str(&format!(", or place a key at {}", default.display()));
                }
                Err(Error::Credentials(format!("credentials is required ({hint})")))
            }
        }
    }

    /// Whether the credentials were adopted from the default location
    pub fn uses_default_credentials(&self) -> bool {
        self.credentials_source == Some(Source::DefaultPath)
    }

    fn config_path_display(&self) -> String {
        match &self.config_path {
            Some(path) => path.display().to_string(),
            None => format!("~/.config/{CONFIG_DIR_NAME}/{CONFIG_FILENAME}"),
        }
    }
}

#[derive(Debug, Clone)]
enum EnvSource {
    Process,
    Fixed(HashMap<String, String>),
}

/// Merges every configuration source into a [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    home: Option<PathBuf>,
    env: EnvSource,
}

impl ConfigResolver {
    /// Resolver reading the process environment and the user's home directory
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
            env: EnvSource::Process,
        }
    }

    /// Use `home` instead of the user's home directory
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Read environment variables from `vars` instead of the process
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = EnvSource::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Conventional config file location
    pub fn default_config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|home| {
            home.join(".config")
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILENAME)
        })
    }

    /// Resolve and validate
    pub fn resolve(&self, overrides: &Overrides, policy: CredentialPolicy) -> Result<Config> {
        let config = self.load(overrides)?;
        config.validate(policy)?;
        Ok(config)
    }

    /// Resolve every field without validating the result
    pub fn load(&self, overrides: &Overrides) -> Result<Config> {
        let (config_path, file) = self.load_file(overrides)?;
        let env = ConfigLayer::from_env(|key| self.var(key));
        let layers = [
            (Source::Override, &overrides.values),
            (Source::Environment, &env),
            (Source::ConfigFile, &file),
        ];

        let pick = |field: Field| -> Option<(String, Source)> {
            let picked = layers
                .iter()
                .find_map(|(source, layer)| layer.get(field).map(|v| (v.to_string(), *source)));
            if let Some((_, source)) = &picked {
                tracing::debug!(field = field.name(), %source, "Resolved configuration field");
            }
            picked
        };

        let bucket = pick(Field::Bucket).map(|(v, _)| v).unwrap_or_default();
        let prefix = pick(Field::Prefix).map(|(v, _)| v).unwrap_or_default();
        let endpoint = pick(Field::Endpoint).map(|(v, _)| v);
        let mut credentials = pick(Field::Credentials).map(|(v, s)| (PathBuf::from(v), s));

        let app_name = overrides.app_name().map(str::to_string);
        let default_credentials = match (&self.home, &app_name) {
            (Some(home), Some(app)) => default_credentials_path_in(home, app),
            _ => None,
        };

        if credentials.is_none() {
            if let Some(path) = default_credentials.as_ref().filter(|p| p.is_file()) {
                tracing::debug!(path = %path.display(), "Using default credentials");
                credentials = Some((path.clone(), Source::DefaultPath));
            }
        }

        let (credentials, credentials_source) = match credentials {
            Some((path, source)) => (Some(path), Some(source)),
            None => (None, None),
        };

        Ok(Config {
            bucket,
            prefix,
            credentials,
            endpoint,
            app_name,
            credentials_source,
            default_credentials,
            config_path,
        })
    }

    /// Locate and parse the config file
    ///
    /// Only the conventional location may be silently absent; a file named
    /// by flag or `REPRINT_CONFIG` must exist.
    fn load_file(&self, overrides: &Overrides) -> Result<(Option<PathBuf>, ConfigLayer)> {
        let explicit = overrides
            .config_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.var(ENV_CONFIG_PATH).map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            let layer = ConfigLayer::from_file(&path)?;
            return Ok((Some(path), layer));
        }

        match self.default_config_path() {
            Some(path) if path.exists() => {
                let layer = ConfigLayer::from_file(&path)?;
                Ok((Some(path), layer))
            }
            path => Ok((path, ConfigLayer::default())),
        }
    }

    /// Environment variable `key`; an empty value counts as unset
    pub fn var(&self, key: &str) -> Option<String> {
        let value = match &self.env {
            EnvSource::Process => std::env::var(key).ok(),
            EnvSource::Fixed(vars) => vars.get(key).cloned(),
        };
        value.filter(|v| !v.is_empty())
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const APP: &str = "test-app";

    fn resolver(home: &TempDir, env: &[(&str, &str)]) -> ConfigResolver {
        ConfigResolver::new()
            .with_home(home.path())
            .with_env(env.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn write_config(home: &TempDir, content: &str) -> PathBuf {
        let dir = home.path().join(".config").join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILENAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn write_default_credentials(home: &TempDir) -> PathBuf {
        let dir = home.path().join(".config").join(APP);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("credentials.json");
        std::fs::write(&path, "{}").unwrap();
        path
    }

    const FULL_ENV: [(&str, &str); 3] = [
        ("REPRINT_BUCKET", "env-bucket"),
        ("REPRINT_PREFIX", "env-prefix/"),
        ("REPRINT_CREDENTIALS", "/env/creds.json"),
    ];

    #[test]
    fn test_env_var_names() {
        assert_eq!(Field::Bucket.env_var(), "REPRINT_BUCKET");
        assert_eq!(Field::Prefix.env_var(), "REPRINT_PREFIX");
        assert_eq!(Field::Credentials.env_var(), "REPRINT_CREDENTIALS");
        assert_eq!(Field::Endpoint.env_var(), "REPRINT_ENDPOINT");
    }

    #[test]
    fn test_load_from_env_vars() {
        let home = TempDir::new().unwrap();
        let config = resolver(&home, &FULL_ENV).load(&Overrides::new()).unwrap();

        assert_eq!(config.bucket, "env-bucket");
        assert_eq!(config.prefix, "env-prefix/");
        assert_eq!(config.credentials, Some(PathBuf::from("/env/creds.json")));
        assert_eq!(config.credentials_source, Some(Source::Environment));
    }

    #[test]
    fn test_load_empty_config() {
        let home = TempDir::new().unwrap();
        let config = resolver(&home, &[]).load(&Overrides::new()).unwrap();

        assert_eq!(config.bucket, "");
        assert_eq!(config.prefix, "");
        assert_eq!(config.credentials, None);
        assert_eq!(config.endpoint, None);
        assert_eq!(config.credentials_source, None);
    }

    #[test]
    fn test_load_with_overrides() {
        let home = TempDir::new().unwrap();
        let overrides = Overrides::new()
            .with_bucket("cli-bucket")
            .with_prefix("cli-prefix/")
            .with_credentials("/cli/creds.json");
        let config = resolver(&home, &[]).load(&overrides).unwrap();

        assert_eq!(config.bucket, "cli-bucket");
        assert_eq!(config.prefix, "cli-prefix/");
        assert_eq!(config.credentials, Some(PathBuf::from("/cli/creds.json")));
        assert_eq!(config.credentials_source, Some(Source::Override));
    }

    #[test]
    fn test_overrides_take_priority_over_env_vars() {
        let home = TempDir::new().unwrap();
        let overrides = Overrides::new()
            .with_bucket("cli-bucket")
            .with_prefix("cli-prefix/")
            .with_credentials("/cli/creds.json");
        let config = resolver(&home, &FULL_ENV).load(&overrides).unwrap();

        assert_eq!(config.bucket, "cli-bucket");
        assert_eq!(config.prefix, "cli-prefix/");
        assert_eq!(config.credentials, Some(PathBuf::from("/cli/creds.json")));
    }

    #[test]
    fn test_empty_overrides_do_not_override() {
        let home = TempDir::new().unwrap();
        let overrides = Overrides::new()
            .with_bucket("")
            .with_prefix("")
            .with_credentials("");
        let config = resolver(&home, &FULL_ENV).load(&overrides).unwrap();

        assert_eq!(config.bucket, "env-bucket");
        assert_eq!(config.prefix, "env-prefix/");
        assert_eq!(config.credentials, Some(PathBuf::from("/env/creds.json")));
    }

    #[test]
    fn test_config_file_is_lowest_explicit_source() {
        let home = TempDir::new().unwrap();
        write_config(
            &home,
            "bucket: file-bucket\nprefix: file-prefix/\ncredentials: /file/creds.json\n",
        );
        let config = resolver(&home, &[("REPRINT_PREFIX", "env-prefix/")])
            .load(&Overrides::new().with_credentials("/cli/creds.json"))
            .unwrap();

        assert_eq!(config.bucket, "file-bucket");
        assert_eq!(config.prefix, "env-prefix/");
        assert_eq!(config.credentials, Some(PathBuf::from("/cli/creds.json")));
    }

    #[test]
    fn test_empty_env_var_does_not_hide_config_file() {
        let home = TempDir::new().unwrap();
        write_config(&home, "bucket: file-bucket\n");
        let config = resolver(&home, &[("REPRINT_BUCKET", "")])
            .load(&Overrides::new())
            .unwrap();

        assert_eq!(config.bucket, "file-bucket");
    }

    #[test]
    fn test_empty_config_file_is_ignored() {
        let home = TempDir::new().unwrap();
        write_config(&home, "\n");
        let config = resolver(&home, &[]).load(&Overrides::new()).unwrap();
        assert_eq!(config.bucket, "");
    }

    #[test]
    fn test_config_file_unknown_keys_are_ignored() {
        let home = TempDir::new().unwrap();
        write_config(&home, "bucket: file-bucket\nregion: asia-northeast1\n");
        let config = resolver(&home, &[]).load(&Overrides::new()).unwrap();
        assert_eq!(config.bucket, "file-bucket");
    }

    #[test]
    fn test_malformed_config_file_is_an_error() {
        let home = TempDir::new().unwrap();
        write_config(&home, "bucket: [unterminated\n");
        let err = resolver(&home, &[]).load(&Overrides::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn test_explicit_config_path() {
        let home = TempDir::new().unwrap();
        write_config(&home, "bucket: conventional-bucket\n");
        let other = home.path().join("other.yaml");
        std::fs::write(&other, "bucket: other-bucket\n").unwrap();

        let config = resolver(&home, &[])
            .load(&Overrides::new().with_config_path(&other))
            .unwrap();
        assert_eq!(config.bucket, "other-bucket");
        assert_eq!(config.config_path, Some(other));
    }

    #[test]
    fn test_config_path_from_env() {
        let home = TempDir::new().unwrap();
        let other = home.path().join("deck.yaml");
        std::fs::write(&other, "prefix: deck/\n").unwrap();

        let config = resolver(&home, &[("REPRINT_CONFIG", other.to_str().unwrap())])
            .load(&Overrides::new())
            .unwrap();
        assert_eq!(config.prefix, "deck/");
    }

    #[test]
    fn test_missing_explicit_config_path_is_an_error() {
        let home = TempDir::new().unwrap();
        let missing = home.path().join("missing.yaml");
        let err = resolver(&home, &[])
            .load(&Overrides::new().with_config_path(&missing))
            .unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_default_credentials_adopted_when_present() {
        let home = TempDir::new().unwrap();
        let cred_file = write_default_credentials(&home);

        let config = resolver(&home, &[])
            .load(&Overrides::new().with_app_name(APP))
            .unwrap();

        assert_eq!(config.credentials, Some(cred_file));
        assert!(config.uses_default_credentials());
    }

    #[test]
    fn test_no_default_credentials_when_file_absent() {
        let home = TempDir::new().unwrap();
        let config = resolver(&home, &[])
            .load(&Overrides::new().with_app_name(APP))
            .unwrap();

        assert_eq!(config.credentials, None);
        assert_eq!(
            config.default_credentials,
            Some(home.path().join(".config/test-app/credentials.json"))
        );
    }

    #[test]
    fn test_no_default_credentials_without_app_name() {
        let home = TempDir::new().unwrap();
        write_default_credentials(&home);
        let config = resolver(&home, &[]).load(&Overrides::new()).unwrap();

        assert_eq!(config.credentials, None);
        assert_eq!(config.default_credentials, None);
    }

    #[test]
    fn test_explicit_credentials_take_priority_over_default() {
        let home = TempDir::new().unwrap();
        write_default_credentials(&home);

        let explicit = "/explicit/path/to/creds.json";
        let config = resolver(&home, &[])
            .load(
                &Overrides::new()
                    .with_app_name(APP)
                    .with_credentials(explicit),
            )
            .unwrap();

        assert_eq!(config.credentials, Some(PathBuf::from(explicit)));
        assert!(!config.uses_default_credentials());
    }

    #[test]
    fn test_config_file_credentials_take_priority_over_default() {
        let home = TempDir::new().unwrap();
        write_default_credentials(&home);
        write_config(&home, "credentials: /file/creds.json\n");

        let config = resolver(&home, &[])
            .load(&Overrides::new().with_app_name(APP))
            .unwrap();
        assert_eq!(config.credentials, Some(PathBuf::from("/file/creds.json")));
        assert_eq!(config.credentials_source, Some(Source::ConfigFile));
    }

    #[test]
    fn test_endpoint_resolution() {
        let home = TempDir::new().unwrap();
        let config = resolver(&home, &[("REPRINT_ENDPOINT", "http://localhost:4443/storage/v1/")])
            .load(&Overrides::new())
            .unwrap();
        assert_eq!(
            config.endpoint.as_deref(),
            Some("http://localhost:4443/storage/v1/")
        );
    }

    #[test]
    fn test_resolve_requires_bucket() {
        let home = TempDir::new().unwrap();
        let err = resolver(&home, &[])
            .resolve(&Overrides::new(), CredentialPolicy::Optional)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("bucket is required"));
        assert!(err.to_string().contains("REPRINT_BUCKET"));
    }

    #[test]
    fn test_resolve_requires_credentials() {
        let home = TempDir::new().unwrap();
        let err = resolver(&home, &[])
            .resolve(
                &Overrides::new().with_app_name(APP).with_bucket("b"),
                CredentialPolicy::Required,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
        let message = err.to_string();
        assert!(message.contains("REPRINT_CREDENTIALS"));
        assert!(message.contains("test-app/credentials.json"));
    }

    #[test]
    fn test_resolve_optional_credentials() {
        let home = TempDir::new().unwrap();
        let config = resolver(&home, &[])
            .resolve(&Overrides::new().with_bucket("b"), CredentialPolicy::Optional)
            .unwrap();
        assert_eq!(config.bucket, "b");
        assert_eq!(config.credentials, None);
    }

    #[test]
    fn test_resolve_rejects_missing_credentials_file() {
        let home = TempDir::new().unwrap();
        let err = resolver(&home, &[("REPRINT_CREDENTIALS", "/nonexistent/creds.json")])
            .resolve(&Overrides::new().with_bucket("b"), CredentialPolicy::Optional)
            .unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
        let message = err.to_string();
        assert!(message.contains("/nonexistent/creds.json"));
        assert!(message.contains("environment"));
    }

    #[test]
    fn test_resolve_with_default_credentials() {
        let home = TempDir::new().unwrap();
        let cred_file = write_default_credentials(&home);
        let config = resolver(&home, &[("REPRINT_BUCKET", "b")])
            .resolve(&Overrides::new().with_app_name(APP), CredentialPolicy::Required)
            .unwrap();
        assert_eq!(config.credentials, Some(cred_file));
    }
}
