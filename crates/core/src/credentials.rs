//! Default credential location
//!
//! Each reprint binary looks for a service-account key at
//! `~/.config/<app-name>/credentials.json` when no other source supplies one.

use std::path::{Path, PathBuf};

/// File name of the default service-account key
pub const DEFAULT_CREDENTIALS_FILENAME: &str = "credentials.json";

/// Compute the default credential path for `app_name` under the user's home
/// directory.
///
/// Returns `None` when the home directory cannot be determined or `app_name`
/// is empty. The file is not checked for existence.
pub fn default_credentials_path(app_name: &str) -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    default_credentials_path_in(&home, app_name)
}

/// Same as [`default_credentials_path`] with an explicit home directory
pub fn default_credentials_path_in(home: &Path, app_name: &str) -> Option<PathBuf> {
    if app_name.is_empty() || home.as_os_str().is_empty() {
        return None;
    }
    Some(
        home.join(".config")
            .join(app_name)
            .join(DEFAULT_CREDENTIALS_FILENAME),
    )
}
