use std::path::Path;

use crate::UploadError;

/// Validates a file name before it is sent to the server.
///
/// The server stores uploads flat inside the session directory, so names
/// must be a single path component. Rejects:
/// - Empty or whitespace-only names
/// - Names containing `/` or `\`
/// - `.` and `..`
/// - Control characters
pub fn validate_file_name(name: &str) -> Result<(), UploadError> {
    if name.trim().is_empty() {
        return Err(UploadError::InvalidName("empty file name".into()));
    }

    if name.contains(['/', '\\']) {
        return Err(UploadError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }

    if name == "." || name == ".." {
        return Err(UploadError::InvalidName(format!(
            "relative directory not allowed: {name}"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(UploadError::InvalidName(format!(
            "control characters not allowed: {name:?}"
        )));
    }

    Ok(())
}

/// Derives the remote file name from a local path (its final component).
pub fn remote_file_name(path: &Path) -> Result<String, UploadError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            UploadError::InvalidName(format!("no usable file name in {}", path.display()))
        })?;
    validate_file_name(name)?;
    Ok(name.to_string())
}
