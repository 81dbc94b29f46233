//! Filesystem image store
//!
//! A flat directory of `*.png` files keyed by name. Writes go to a temporary
//! file in the same directory and are renamed into place, so readers never
//! observe a partially written image.

use crate::error::{AppError, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of in-flight temporary files; excluded from listings
const TEMP_PREFIX: &str = ".incoming-";

/// Handle to the image directory
#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Open (and create if missing) the image directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            AppError::StoreWriteError(format!(
                "Failed to create image directory {}: {e}",
                root.display()
            ))
        })?;

        info!(path = %root.display(), "Image store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `name`, replacing any existing file
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        validate_name(name)?;
        let target = self.root.join(name);

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)
            .map_err(|e| AppError::StoreWriteError(format!("Failed to create temp file: {e}")))?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| {
            AppError::StoreWriteError(format!("Failed to move image into place: {}", e.error))
        })?;

        debug!(name = %name, size = bytes.len(), "Image written");
        Ok(())
    }

    /// Read an image; bare names get `.png` appended
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        fs::read(&path).map_err(|e| not_found_or_io(e, name))
    }

    /// Delete an image; bare names get `.png` appended
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).map_err(|e| not_found_or_io(e, name))?;

        info!(name = %name, "Image deleted");
        Ok(())
    }

    /// Names of every stored file, in directory order
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let name = normalize_name(name);
        validate_name(&name)?;
        Ok(self.root.join(name))
    }
}

/// Append `.png` unless the name already carries it (any case)
pub fn normalize_name(name: &str) -> String {
    let has_png = Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false);

    if has_png {
        name.to_string()
    } else {
        format!("{name}.png")
    }
}

/// Names must stay inside the store directory
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.starts_with(TEMP_PREFIX);

    if invalid {
        return Err(AppError::BadRequest(format!("Invalid image name '{name}'")));
    }
    Ok(())
}

fn not_found_or_io(err: std::io::Error, name: &str) -> AppError {
    if err.kind() == ErrorKind::NotFound {
        AppError::NotFound(format!("Image not found: {name}"))
    } else {
        AppError::StoreWriteError(err.to_string())
    }
}
