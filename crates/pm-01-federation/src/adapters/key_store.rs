//! Instance key and id files.

use crate::domain::{IdentityError, InstanceKey};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

fn key_file_error(path: &Path, err: impl std::fmt::Display) -> IdentityError {
    IdentityError::KeyFile {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Write `contents` readable by the owner only.
fn write_private(path: &Path, contents: &str) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| key_file_error(parent, e))?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| key_file_error(path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| key_file_error(path, e))
}

/// Load the PEM key at `path`, generating and saving a new one when absent.
pub fn load_or_generate_key(path: &Path, bits: usize) -> Result<InstanceKey, IdentityError> {
    if path.exists() {
        let pem = fs::read_to_string(path).map_err(|e| key_file_error(path, e))?;
        return InstanceKey::from_pem(&pem);
    }

    let key = InstanceKey::generate(bits)?;
    write_private(path, &key.to_pem()?)?;
    info!(path = %path.display(), bits, "generated instance key");
    Ok(key)
}

/// `<key_path>.id`
pub fn instance_id_path(key_path: &Path) -> PathBuf {
    let mut name = key_path.as_os_str().to_owned();
    name.push(".id");
    PathBuf::from(name)
}

/// Stable instance id stored next to the key, created on first use.
pub fn load_or_create_instance_id(key_path: &Path) -> Result<String, IdentityError> {
    let path = instance_id_path(key_path);
    if path.exists() {
        let id = fs::read_to_string(&path).map_err(|e| key_file_error(&path, e))?;
        let id = id.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }
    let id = uuid::Uuid::new_v4().to_string();
    write_private(&path, &id)?;
    Ok(id)
}
