//! Utility functions for directory management and output files
//!
//! Configuration follows the XDG Base Directory specification:
//!
//! - Config: `~/.config/simpfw/config.json`
//!
//! # Example
//!
//! ```
//! use simpfw::utils::get_config_dir;
//!
//! if let Some(dir) = get_config_dir() {
//!     assert!(dir.is_absolute());
//! }
//! ```

use directories::ProjectDirs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "simpfw", "simpfw").map(|pd| pd.config_dir().to_path_buf())
}

/// Creates `dir` and its parents, user-only on Unix.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        DirBuilder::new().mode(0o700).recursive(true).create(dir)
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
    }
}

/// Writes compiled output next to its destination and renames it into place, so
/// readers never observe a half-written file.
///
/// # Errors
///
/// Returns `Err` if the temp file cannot be created in the destination directory,
/// written, or persisted over `path`.
pub fn write_output(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    temp.write_all(contents.as_bytes())?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
