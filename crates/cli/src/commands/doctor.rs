//! doctor command - Diagnose configuration, credentials and permissions
//!
//! Runs the checks in order and stops the storage checks at the first
//! failure. Every check that ran is reported, followed by a summary.

use console::style;
use reprint_core::{Config, CredentialPolicy, Field, ImageStore, UploadBody};
use reprint_gcs::GcsClient;
use serde::Serialize;
use uuid::Uuid;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Name prefix of the object written by the permission checks
pub const TEST_OBJECT_PREFIX: &str = ".reprint-doctor-test-";

const TEST_OBJECT_CONTENT_TYPE: &str = "text/plain";
const TEST_OBJECT_DATA: &[u8] = b"reprint-gcs doctor test";

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
    Skipped,
}

/// One diagnostic line
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl Check {
    fn ok(name: &'static str, detail: Option<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Ok,
            detail,
            hints: Vec::new(),
        }
    }

    fn error(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Error,
            detail: Some(detail.into()),
            hints: Vec::new(),
        }
    }

    fn skipped(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            detail: Some(detail.into()),
            hints: Vec::new(),
        }
    }

    fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints.extend(hints.into_iter().map(Into::into));
        self
    }
}

/// All checks that ran
#[derive(Debug, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    fn push(&mut self, check: Check) {
        tracing::debug!(check = check.name, status = ?check.status, detail = ?check.detail, "Doctor check");
        self.checks.push(check);
    }

    /// No check reported an error
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Error)
    }

    /// Look up a check by name
    pub fn find(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }
}

#[derive(Serialize)]
struct DoctorOutput<'a> {
    passed: bool,
    checks: &'a [Check],
}

/// Execute the doctor command
pub async fn execute(ctx: &Context) -> ExitCode {
    let mut report = DoctorReport::default();

    if let Some(config) = check_config(&mut report, ctx) {
        if let Some(client) = check_connection(&mut report, &config) {
            let client = client.with_cancellation(ctx.cancel.clone());
            check_storage(&mut report, &client).await;
            ctx.close(client);
        }
    } else {
        report.push(Check::skipped(
            "[GCS] Connecting",
            "fix the configuration errors first",
        ));
    }

    render(&ctx.formatter, &report);

    if report.passed() {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}

/// Resolve the configuration and report each field
///
/// Returns the configuration when it is complete enough to connect.
pub fn check_config(report: &mut DoctorReport, ctx: &Context) -> Option<Config> {
    let config = match ctx.resolver.load(&ctx.storage.overrides()) {
        Ok(config) => {
            let detail = config.config_path.as_ref().map(|p| p.display().to_string());
            report.push(Check::ok("[Config] Loading configuration", detail));
            config
        }
        Err(e) => {
            report.push(Check::error("[Config] Loading configuration", e.to_string()));
            return None;
        }
    };
    let config_file = config
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/reprint/config.yaml".to_string());

    let bucket_ok = if config.bucket.is_empty() {
        report.push(
            Check::error("[Config] Bucket configured", "bucket is not set").with_hints([
                "Set via one of:".to_string(),
                "  --bucket flag".to_string(),
                format!("  {} environment variable", Field::Bucket.env_var()),
                format!("  bucket in {config_file}"),
            ]),
        );
        false
    } else {
        report.push(Check::ok("[Config] Bucket configured", Some(config.bucket.clone())));
        true
    };

    if config.prefix.is_empty() {
        report.push(Check::skipped("[Config] Prefix configured", "not set"));
    } else {
        report.push(Check::ok("[Config] Prefix configured", Some(config.prefix.clone())));
    }

    let endpoint = match &config.endpoint {
        Some(endpoint) => format!("emulator: {endpoint}"),
        None => "production".to_string(),
    };
    report.push(Check::ok("[Config] Endpoint", Some(endpoint)));

    let policy = ctx.storage.policy(&config);
    let credentials_ok = match &config.credentials {
        Some(path) => {
            let detail = if config.uses_default_credentials() {
                format!("using default: {}", path.display())
            } else {
                let source = config
                    .credentials_source
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                format!("{} (from {source})", path.display())
            };
            report.push(Check::ok("[Auth] Credentials configured", Some(detail)));

            if path.is_file() {
                report.push(Check::ok("[Auth] Credentials file exists", None));
                true
            } else {
                report.push(
                    Check::error(
                        "[Auth] Credentials file exists",
                        format!("file not found: {}", path.display()),
                    )
                    .with_hints(["Check that the path is correct and the file is readable"]),
                );
                false
            }
        }
        None if policy == CredentialPolicy::Optional => {
            let detail = if config.endpoint.is_some() {
                "not required for emulator endpoint"
            } else {
                "not set, using ambient credentials"
            };
            report.push(Check::ok("[Auth] Credentials configured", Some(detail.to_string())));
            true
        }
        None => {
            let mut hints = vec![
                "Set via one of:".to_string(),
                "  --credentials flag".to_string(),
                format!("  {} environment variable", Field::Credentials.env_var()),
                format!("  credentials in {config_file}"),
            ];
            if let Some(default) = &config.default_credentials {
                hints.push(format!("  place key at {}", default.display()));
            }
            report.push(
                Check::error("[Auth] Credentials configured", "credentials not set").with_hints(hints),
            );
            false
        }
    };

    (bucket_ok && credentials_ok).then_some(config)
}

/// Construct the storage client
pub fn check_connection(report: &mut DoctorReport, config: &Config) -> Option<GcsClient> {
    match GcsClient::from_config(config) {
        Ok(client) => {
            let detail = client.endpoint().map(|e| format!("emulator: {}", e.base_url()));
            report.push(Check::ok("[GCS] Connecting", detail));
            Some(client)
        }
        Err(e) => {
            report.push(Check::error("[GCS] Connecting", e.to_string()));
            None
        }
    }
}

/// Exercise bucket access and the upload and delete permissions
pub async fn check_storage(report: &mut DoctorReport, store: &dyn ImageStore) {
    if let Err(e) = store.check_bucket().await {
        report.push(
            Check::error("[GCS] Checking bucket access", e.to_string()).with_hints([
                "Required permission: storage.objects.list",
                "Recommended role: roles/storage.objectViewer",
            ]),
        );
        return;
    }
    report.push(Check::ok("[GCS] Checking bucket access", None));

    let test_object = format!("{TEST_OBJECT_PREFIX}{}", Uuid::new_v4());
    let body: UploadBody = Box::new(TEST_OBJECT_DATA);
    if let Err(e) = store
        .upload(&test_object, body, TEST_OBJECT_CONTENT_TYPE)
        .await
    {
        report.push(
            Check::error("[GCS] Testing upload permission", e.to_string()).with_hints([
                "Required permission: storage.objects.create",
                "Recommended role: roles/storage.objectAdmin",
            ]),
        );
        return;
    }
    report.push(Check::ok("[GCS] Testing upload permission", None));

    if let Err(e) = store.delete(&test_object).await {
        report.push(
            Check::error("[GCS] Testing delete permission", e.to_string()).with_hints([
                "Required permissions: storage.objects.get, storage.objects.delete".to_string(),
                "Recommended role: roles/storage.objectAdmin".to_string(),
                format!("Note: Test object {test_object:?} was left in the bucket"),
            ]),
        );
        return;
    }
    report.push(Check::ok("[GCS] Testing delete permission", None));

    let check = match store.delete(&test_object).await {
        Err(e) if e.is_not_found() => Check::ok("[GCS] Verifying deleted object is gone", None),
        Err(e) => Check::error("[GCS] Verifying deleted object is gone", e.to_string()),
        Ok(()) => Check::error(
            "[GCS] Verifying deleted object is gone",
            "deleting the removed test object succeeded",
        ),
    };
    report.push(check);
}

fn render(formatter: &Formatter, report: &DoctorReport) {
    if formatter.is_json() {
        formatter.json(&DoctorOutput {
            passed: report.passed(),
            checks: &report.checks,
        });
        return;
    }

    formatter.println("Checking reprint-gcs configuration...");
    formatter.println("");
    for check in &report.checks {
        let status = match check.status {
            CheckStatus::Ok => formatter.paint(style("OK").green()).to_string(),
            CheckStatus::Error => formatter.paint(style("ERROR").red().bold()).to_string(),
            CheckStatus::Skipped => formatter.paint(style("SKIPPED").yellow()).to_string(),
        };
        let line = match (&check.status, &check.detail) {
            (CheckStatus::Error, Some(detail)) => format!("{}... {status}: {detail}", check.name),
            (_, Some(detail)) => format!("{}... {status} ({detail})", check.name),
            (_, None) => format!("{}... {status}", check.name),
        };
        formatter.println(&line);
        for hint in &check.hints {
            formatter.println(&format!("  {hint}"));
        }
    }

    formatter.println("");
    if report.passed() {
        formatter.println(&formatter.paint(style("All checks passed!").green()).to_string());
    } else {
        formatter.println(
            &formatter
                .paint(style("Some checks failed. Please fix the issues above.").red())
                .to_string(),
        );
    }
}
