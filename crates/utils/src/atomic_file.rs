//! Atomic file operations so readers never observe a partially written dataset

use datavault_core::{Error, Result};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

/// Write data to a file atomically by writing to a temporary file and renaming
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::configuration("Invalid file path: no parent directory"))?;

    fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::io(parent, "create parent directory", e))?;

    // Same directory so the rename never crosses a file system boundary
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    if let Err(e) = write_and_sync(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    match fs::rename(&temp_path, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(Error::io(path, "atomic rename", e))
        }
    }
}

async fn write_and_sync(temp_path: &Path, content: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| Error::io(temp_path, "create temporary file", e))?;

    file.write_all(content)
        .await
        .map_err(|e| Error::io(temp_path, "write to temporary file", e))?;

    file.sync_all()
        .await
        .map_err(|e| Error::io(temp_path, "sync temporary file", e))?;

    Ok(())
}

/// Whether a directory entry is a temporary file left by `write_atomic`
#[must_use]
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}
