use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};
use tracing::debug;
use vecbulk_common::Result;

/// Write a file atomically (temp file + rename)
///
/// `write` receives a buffered writer on a uniquely named temp file created
/// next to `path`. The temp file is synced and persisted onto `path` only when
/// `write` succeeds; on any failure it is deleted and `path` keeps its
/// previous content.
pub fn write_atomic<T, F>(path: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let (file, tmp_path) = NamedTempFile::new_in(dir)?.into_parts();

    // Dropping `tmp_path` on an early return removes the temp file
    let value = write_and_sync(file, write)?;
    persist(tmp_path, path)?;
    Ok(value)
}

fn write_and_sync<T, F>(file: File, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    let mut writer = BufWriter::new(file);
    let value = write(&mut writer)?;
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;

    // Temp files are created 0600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    file.sync_all()?;
    Ok(value)
}

fn persist(tmp_path: TempPath, path: &Path) -> Result<()> {
    let tmp_display = tmp_path.display().to_string();
    // A failed persist hands the temp path back; dropping it deletes the file
    tmp_path.persist(path).map_err(|e| e.error)?;
    debug!("Renamed {} -> {}", tmp_display, path.display());
    Ok(())
}
