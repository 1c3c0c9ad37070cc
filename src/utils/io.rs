//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read a UTF-8 file, mapping failures to `internal.io_error`.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write raw bytes, creating or truncating the file.
pub fn write_bytes(path: &Path, content: &[u8], operation: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// Readers see either the old content or the new content, never a partial write.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let invalid_path = || {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    };
    let parent = path.parent().ok_or_else(invalid_path)?;
    let filename = path.file_name().ok_or_else(invalid_path)?;

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "<project/>").unwrap();

        let content = read_file(temp.path(), "read POM").unwrap();
        assert!(content.contains("<project/>"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let err = read_file(Path::new("/nonexistent/pom.xml"), "read POM").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn write_bytes_keeps_binary_content() {
        let temp = NamedTempFile::new().unwrap();
        write_bytes(temp.path(), &[0x47, 0x49, 0x46, 0x00, 0xff], "write gif").unwrap();
        assert_eq!(fs::read(temp.path()).unwrap(), vec![0x47, 0x49, 0x46, 0x00, 0xff]);
    }

    #[test]
    fn write_bytes_fails_for_missing_directory() {
        let err = write_bytes(Path::new("/nonexistent/dir/heartbeat.gif"), b"x", "write")
            .unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pom.xml");
        fs::write(&path, "old").unwrap();

        write_file_atomic(&path, "new", "write POM").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join("pom.xml.tmp").exists());
    }
}
