use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;

/// Unix mode for the config directory.
pub const PRIVATE_DIR_MODE: u32 = 0o700;
/// Unix mode for the config file. It holds live tokens.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Writes `bytes` to `path` so that readers only ever observe the old or the
/// new contents.
///
/// The data goes to a uniquely named sibling first and is renamed over the
/// target once fully written and synced.
pub fn write_private_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_private_parent(path)?;

    let temp_path = temp_path_for(path);
    if let Err(err) = write_synced(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    set_permissions(path, PRIVATE_FILE_MODE)
}

fn write_synced(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut file = fs::File::create(temp_path)?;
    set_permissions(temp_path, PRIVATE_FILE_MODE)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Applies Unix permissions when supported.
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

fn ensure_private_parent(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };

    if !parent.exists() {
        fs::create_dir_all(parent)?;
        set_permissions(parent, PRIVATE_DIR_MODE)?;
        tracing::debug!("Created config directory: {}", parent.display());
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let suffix = Uuid::new_v4();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("config");
    path.with_file_name(format!(".{file_name}.{suffix}.tmp"))
}
