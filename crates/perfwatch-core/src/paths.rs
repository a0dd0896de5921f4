//! Workspace containment for user-supplied relative paths.
//!
//! Any `..` segment is rejected outright, even one that would normalize back
//! inside the workspace.

use std::path::{Path, PathBuf};

use crate::error::PathSafetyError;

/// Resolve `candidate` against `workspace`, rejecting anything that could escape it.
pub fn resolve_in_workspace(workspace: &Path, candidate: &str) -> Result<PathBuf, PathSafetyError> {
    validate_relative(candidate)?;
    Ok(workspace.join(candidate.trim()))
}

/// Check that `candidate` is a plain relative path.
pub fn validate_relative(candidate: &str) -> Result<(), PathSafetyError> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(PathSafetyError::Empty);
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') || Path::new(trimmed).is_absolute() {
        return Err(PathSafetyError::Absolute(candidate.to_string()));
    }
    if has_drive_letter(trimmed) {
        return Err(PathSafetyError::DriveLetter(candidate.to_string()));
    }
    if trimmed.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathSafetyError::Traversal(candidate.to_string()));
    }
    Ok(())
}

fn has_drive_letter(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
