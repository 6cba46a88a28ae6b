pub mod api;
pub mod config;
pub mod output;
pub mod providers;

use std::path::PathBuf;

/// Root of the installed service tree. Relative configuration paths
/// (output folder, font paths) resolve against this directory.
pub fn default_install_root() -> PathBuf {
    let fallback = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    fallback.canonicalize().unwrap_or(fallback)
}
