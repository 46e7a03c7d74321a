//! upload command - Store an image read from standard input
//!
//! The object is named with a fresh UUID. Standard output receives the
//! access URL on the first line and the object id on the second, which is
//! the contract deck parses.

use clap::Args;
use jiff::{SignedDuration, Timestamp};
use reprint_core::{DEFAULT_SIGNED_URL_EXPIRATION, ImageStore};
use serde::Serialize;
use uuid::Uuid;

use super::Context;
use crate::exit_code::ExitCode;

/// Environment fallback for `--mime`
pub const UPLOAD_MIME_ENV: &str = "DECK_UPLOAD_MIME";

/// Upload an image from standard input
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// MIME type of the image (e.g. image/png) [env: DECK_UPLOAD_MIME]
    #[arg(long)]
    pub mime: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    url: String,
    object_id: String,
    key: String,
    content_type: String,
    signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

/// Execute the upload command
pub async fn execute(args: UploadArgs, ctx: &Context) -> ExitCode {
    let config = match ctx.load_config() {
        Ok(config) => config,
        Err(e) => return ctx.fail(&e),
    };

    let Some(content_type) = ctx.arg_or_env(args.mime, UPLOAD_MIME_ENV) else {
        return ctx.usage("MIME type is required (--mime or DECK_UPLOAD_MIME)");
    };

    let client = match ctx.connect(&config) {
        Ok(client) => client,
        Err(e) => return ctx.fail(&e),
    };

    let object_id = Uuid::new_v4().to_string();
    let key = client.object_key(&object_id);
    let signed = client.can_sign();
    tracing::debug!(%object_id, %key, %content_type, "Uploading from stdin");

    let result = client
        .upload(&object_id, Box::new(tokio::io::stdin()), &content_type)
        .await;
    ctx.close(client);

    let url = match result {
        Ok(url) => url,
        Err(e) => return ctx.fail(&e),
    };

    if ctx.formatter.is_json() {
        let expires_at = signed
            .then(|| SignedDuration::try_from(DEFAULT_SIGNED_URL_EXPIRATION).ok())
            .flatten()
            .and_then(|ttl| Timestamp::now().checked_add(ttl).ok())
            .map(|ts| ts.to_string());
        ctx.formatter.json(&UploadOutput {
            url,
            object_id,
            key,
            content_type,
            signed,
            expires_at,
        });
    } else {
        ctx.formatter.println(&url);
        ctx.formatter.println(&object_id);
    }

    ExitCode::Success
}
