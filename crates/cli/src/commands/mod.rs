//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations.
//! Commands are organized by functionality and follow the pattern
//! established in the command implementation template.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use reprint_core::{Config, ConfigLayer, ConfigResolver, CredentialPolicy, Error, Overrides};
use reprint_gcs::GcsClient;
use tokio_util::sync::CancellationToken;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod completions;
mod delete;
pub mod doctor;
mod upload;
mod url;

/// Application name; selects `~/.config/reprint-gcs/credentials.json`
pub const APP_NAME: &str = "reprint-gcs";

/// reprint-gcs - image storage for deck on Google Cloud Storage
///
/// Uploads images read from standard input and deletes them by object id.
/// Settings come from flags, REPRINT_* environment variables, or
/// ~/.config/reprint/config.yaml, in that order.
#[derive(Parser, Debug)]
#[command(name = "reprint-gcs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Storage settings shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct StorageArgs {
    /// GCS bucket name
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Object name prefix, prepended verbatim (e.g. "deck/")
    ///
    /// The resulting names may not contain empty, "." or ".." segments, so
    /// a prefix such as "images//" is rejected.
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Path to a service account key file
    #[arg(long, global = true)]
    pub credentials: Option<String>,

    /// Alternate storage endpoint such as a GCS emulator
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Config file to read instead of ~/.config/reprint/config.yaml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fall back to ambient Google credentials when no key file is configured
    #[arg(long, global = true, default_value = "false")]
    pub ambient_credentials: bool,
}

impl StorageArgs {
    /// Flag values as the highest-precedence configuration layer
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides::new().with_app_name(APP_NAME);
        overrides.values = ConfigLayer {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            credentials: self.credentials.clone(),
            endpoint: self.endpoint.clone(),
        };
        overrides.config_path = self.config.clone();
        overrides
    }

    /// Emulators never authenticate, so an endpoint relaxes the key requirement
    pub fn policy(&self, config: &Config) -> CredentialPolicy {
        if self.ambient_credentials || config.endpoint.is_some() {
            CredentialPolicy::Optional
        } else {
            CredentialPolicy::Required
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload an image read from standard input
    Upload(upload::UploadArgs),

    /// Delete a previously uploaded image
    Delete(delete::DeleteArgs),

    /// Print the URL of an uploaded image
    Url(url::UrlArgs),

    /// Check configuration, credentials and bucket permissions
    Doctor,

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Shared state handed to every command
pub struct Context {
    pub storage: StorageArgs,
    pub resolver: ConfigResolver,
    pub cancel: CancellationToken,
    pub formatter: Formatter,
}

impl Context {
    /// Resolve and validate the configuration for a storage command
    pub fn load_config(&self) -> reprint_core::Result<Config> {
        let config = self.resolver.load(&self.storage.overrides())?;
        config.validate(self.storage.policy(&config))?;
        Ok(config)
    }

    /// Open a client bound to the shared cancellation token
    pub fn connect(&self, config: &Config) -> reprint_core::Result<GcsClient> {
        Ok(GcsClient::from_config(config)?.with_cancellation(self.cancel.clone()))
    }

    /// Close the client; a failure is reported but does not change the outcome
    pub fn close(&self, client: GcsClient) {
        if let Err(e) = client.close() {
            tracing::warn!(error = %e, "Failed to close GCS client");
            self.formatter.warning(&format!("failed to close client: {e}"));
        }
    }

    /// Flag value, falling back to the environment variable `key`
    ///
    /// An empty flag counts as unset, so it does not hide the variable.
    pub fn arg_or_env(&self, value: Option<String>, key: &str) -> Option<String> {
        non_empty(value).or_else(|| self.resolver.var(key))
    }

    /// Report an error and map it to an exit code
    pub fn fail(&self, err: &Error) -> ExitCode {
        self.formatter.error(&err.to_string());
        ExitCode::from(err)
    }

    /// Report a usage error
    pub fn usage(&self, message: &str) -> ExitCode {
        self.formatter.error(message);
        ExitCode::UsageError
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli, cancel: CancellationToken) -> ExitCode {
    execute_with(cli, ConfigResolver::new(), cancel).await
}

/// Execute with an explicit configuration resolver
pub async fn execute_with(cli: Cli, resolver: ConfigResolver, cancel: CancellationToken) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
    };
    let ctx = Context {
        storage: cli.storage,
        resolver,
        cancel,
        formatter: Formatter::new(output_config),
    };

    match cli.command {
        Commands::Upload(args) => upload::execute(args, &ctx).await,
        Commands::Delete(args) => delete::execute(args, &ctx).await,
        Commands::Url(args) => url::execute(args, &ctx).await,
        Commands::Doctor => doctor::execute(&ctx).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Treat an empty value the same as a missing one
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reprint_core::Source;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("reprint-gcs").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["upload", "--bucket", "b", "--prefix", "deck/", "--json"]);
        assert_eq!(cli.storage.bucket.as_deref(), Some("b"));
        assert_eq!(cli.storage.prefix.as_deref(), Some("deck/"));
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Upload(_)));
    }

    #[test]
    fn test_overrides_take_precedence_over_environment() {
        let home = TempDir::new().unwrap();
        let resolver = ConfigResolver::new()
            .with_home(home.path())
            .with_env([("REPRINT_BUCKET", "env-bucket"), ("REPRINT_PREFIX", "env/")]);
        let cli = parse(&["doctor", "--bucket", "flag-bucket"]);

        let config = resolver.load(&cli.storage.overrides()).unwrap();
        assert_eq!(config.bucket, "flag-bucket");
        assert_eq!(config.prefix, "env/");
        assert_eq!(config.app_name.as_deref(), Some(APP_NAME));
    }

    #[test]
    fn test_default_credentials_use_app_name() {
        let home = TempDir::new().unwrap();
        let key = home.path().join(".config").join(APP_NAME).join("credentials.json");
        std::fs::create_dir_all(key.parent().unwrap()).unwrap();
        std::fs::write(&key, "{}").unwrap();

        let resolver = ConfigResolver::new().with_home(home.path()).with_env(
            std::iter::empty::<(String, String)>(),
        );
        let config = resolver.load(&parse(&["doctor"]).storage.overrides()).unwrap();
        assert_eq!(config.credentials.as_deref(), Some(key.as_path()));
        assert_eq!(config.credentials_source, Some(Source::DefaultPath));
    }

    #[test]
    fn test_policy() {
        let cli = parse(&["doctor"]);
        let mut config = Config {
            bucket: "b".into(),
            prefix: String::new(),
            credentials: None,
            endpoint: None,
            app_name: None,
            credentials_source: None,
            default_credentials: None,
            config_path: None,
        };
        assert_eq!(cli.storage.policy(&config), CredentialPolicy::Required);

        config.endpoint = Some("http://localhost:4443/storage/v1/".into());
        assert_eq!(cli.storage.policy(&config), CredentialPolicy::Optional);

        config.endpoint = None;
        let cli = parse(&["doctor", "--ambient-credentials"]);
        assert_eq!(cli.storage.policy(&config), CredentialPolicy::Optional);
    }

    #[test]
    fn test_prefix_help_names_key_restrictions() {
        use clap::CommandFactory;

        let cmd = Cli::command();
        let prefix = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "prefix")
            .unwrap();
        let help = prefix.get_long_help().unwrap().to_string();
        assert!(help.contains("prepended verbatim"), "help: {help}");
        assert!(help.contains("\"images//\""), "help: {help}");
    }

    #[test]
    fn test_arg_or_env() {
        let home = TempDir::new().unwrap();
        let ctx = Context {
            storage: StorageArgs::default(),
            resolver: ConfigResolver::new()
                .with_home(home.path())
                .with_env([("DECK_UPLOAD_MIME", "image/png"), ("DECK_DELETE_ID", "")]),
            cancel: CancellationToken::new(),
            formatter: Formatter::default(),
        };

        assert_eq!(
            ctx.arg_or_env(Some("image/jpeg".into()), "DECK_UPLOAD_MIME").as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(
            ctx.arg_or_env(Some(String::new()), "DECK_UPLOAD_MIME").as_deref(),
            Some("image/png")
        );
        assert_eq!(ctx.arg_or_env(None, "DECK_UPLOAD_MIME").as_deref(), Some("image/png"));
        assert_eq!(ctx.arg_or_env(Some(String::new()), "DECK_DELETE_ID"), None);
        assert_eq!(ctx.arg_or_env(None, "DECK_DELETE_ID"), None);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("image/png".into())), Some("image/png".into()));
    }
}
