//! url command - Print the access URL of an uploaded image

use std::time::Duration;

use clap::Args;
use jiff::{SignedDuration, Timestamp};
use reprint_core::{CredentialPolicy, DEFAULT_SIGNED_URL_EXPIRATION, ImageStore};
use serde::Serialize;

use super::{Context, non_empty};
use crate::exit_code::ExitCode;

/// Print a signed or public URL for an object
#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Object id printed by upload
    #[arg(long = "object-id", visible_alias = "filename")]
    pub object_id: Option<String>,

    /// Signed URL lifetime (e.g. "15m", "2h 30m")
    #[arg(long, value_parser = parse_expiration)]
    pub expires: Option<Duration>,

    /// Print the unsigned public URL
    #[arg(long, default_value = "false")]
    pub public: bool,
}

#[derive(Debug, Serialize)]
struct UrlOutput {
    url: String,
    object_id: String,
    signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

/// Execute the url command
pub async fn execute(args: UrlArgs, ctx: &Context) -> ExitCode {
    // Public URLs are derived locally and need no key
    let config = match ctx.resolver.load(&ctx.storage.overrides()).and_then(|config| {
        let policy = if args.public {
            CredentialPolicy::Optional
        } else {
            ctx.storage.policy(&config)
        };
        config.validate(policy).map(|_| config)
    }) {
        Ok(config) => config,
        Err(e) => return ctx.fail(&e),
    };

    let Some(object_id) = non_empty(args.object_id) else {
        return ctx.usage("object-id is required (--object-id)");
    };

    let client = match ctx.connect(&config) {
        Ok(client) => client,
        Err(e) => return ctx.fail(&e),
    };

    let expiration = args.expires.unwrap_or(DEFAULT_SIGNED_URL_EXPIRATION);
    let signed = !args.public && client.can_sign();
    let result = if args.public {
        Ok(client.public_url(&object_id))
    } else {
        client.signed_url(&object_id, expiration).await
    };
    ctx.close(client);

    let url = match result {
        Ok(url) => url,
        Err(e) => return ctx.fail(&e),
    };

    if ctx.formatter.is_json() {
        let expires_at = signed
            .then(|| SignedDuration::try_from(expiration).ok())
            .flatten()
            .and_then(|ttl| Timestamp::now().checked_add(ttl).ok())
            .map(|ts| ts.to_string());
        ctx.formatter.json(&UrlOutput {
            url,
            object_id,
            signed,
            expires_at,
        });
    } else {
        ctx.formatter.println(&url);
    }

    ExitCode::Success
}

/// Parse a positive duration in jiff's friendly or ISO 8601 format
fn parse_expiration(value: &str) -> Result<Duration, String> {
    let duration: SignedDuration = value
        .parse()
        .map_err(|e| format!("invalid duration '{value}': {e}"))?;
    if duration.is_zero() || duration.is_negative() {
        return Err(format!("duration must be positive: {value}"));
    }
    Duration::try_from(duration).map_err(|e| format!("invalid duration '{value}': {e}"))
}
