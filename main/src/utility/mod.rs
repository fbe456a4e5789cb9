//! Small generic helpers shared by more than one module.

#[macro_use]
pub mod enum_passthrough;

use std::path::{Path, PathBuf};

/// Expand a leading `~` or `~/` in a path to the user's home directory.
pub fn tilde_expansion(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    } else if path == "~" {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(path)
}
