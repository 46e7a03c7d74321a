//! delete command - Remove a previously uploaded image
//!
//! Prints nothing on success; deleting an object that does not exist is
//! an error.

use clap::Args;
use reprint_core::ImageStore;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Environment fallback for `--object-id`
pub const DELETE_ID_ENV: &str = "DECK_DELETE_ID";

/// Delete an image by object id
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Object id printed by upload [env: DECK_DELETE_ID]
    #[arg(long = "object-id", visible_alias = "filename")]
    pub object_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    object_id: String,
    key: String,
    deleted: bool,
}

/// Execute the delete command
pub async fn execute(args: DeleteArgs, ctx: &Context) -> ExitCode {
    let config = match ctx.load_config() {
        Ok(config) => config,
        Err(e) => return ctx.fail(&e),
    };

    let Some(object_id) = ctx.arg_or_env(args.object_id, DELETE_ID_ENV) else {
        return ctx.usage("object-id is required (--object-id or DECK_DELETE_ID)");
    };

    let client = match ctx.connect(&config) {
        Ok(client) => client,
        Err(e) => return ctx.fail(&e),
    };

    let key = client.object_key(&object_id);
    let result = client.delete(&object_id).await;
    ctx.close(client);

    if let Err(e) = result {
        return ctx.fail(&e);
    }

    if ctx.formatter.is_json() {
        ctx.formatter.json(&DeleteOutput {
            object_id,
            key,
            deleted: true,
        });
    }

    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::commands::{Cli, Commands};

    #[test]
    fn test_delete_filename_alias() {
        let cli = Cli::try_parse_from(["reprint-gcs", "delete", "--filename", "abc-123"]).unwrap();
        let Commands::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(args.object_id.as_deref(), Some("abc-123"));
    }
}
