//! Path-query normalization and resolution beneath the shared folder root.
//!
//! Every `/api/files/*` endpoint runs its `path`/`name` query parameters
//! through here first. Rejecting a bad path must never touch the filesystem.

use std::path::{Path, PathBuf};

use crate::error::ApiError;

/// Splits `raw` on `/` and rejects any segment that is empty, `.`, `..`, or
/// contains a backslash. An empty `raw` (the shared-folder root) yields an
/// empty segment list, which is valid; a non-empty `raw` with a stray `//`
/// or a leading/trailing `/` is not — every segment it implies must be real.
pub fn split_segments(raw: &str) -> Result<Vec<String>, ApiError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    for part in raw.split('/') {
        let trimmed = part.trim();
        if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed.contains('\\') {
            return Err(ApiError::validation("invalid path segment"));
        }
        segments.push(trimmed.to_string());
    }
    Ok(segments)
}

pub fn has_hidden_segment(segments: &[String]) -> bool {
    segments.iter().any(|s| s.starts_with('.'))
}

/// Resolves `segments` beneath `root`. Missing intermediate directories are
/// an error unless `create_if_missing` is set, in which case they (and any
/// trailing directory component) are created.
pub fn resolve(root: &Path, segments: &[String], create_if_missing: bool) -> Result<PathBuf, ApiError> {
    let mut current = root.to_path_buf();
    for segment in segments {
        current.push(segment);
    }
    if create_if_missing {
        let parent = current.parent().unwrap_or(root);
        std::fs::create_dir_all(parent)?;
    }
    Ok(current)
}

/// Resolves an existing path, returning `NotFound` if any of it is missing.
pub fn resolve_existing(root: &Path, segments: &[String]) -> Result<PathBuf, ApiError> {
    let resolved = resolve(root, segments, false)?;
    if !resolved.exists() {
        return Err(ApiError::NotFound);
    }
    Ok(resolved)
}

/// Appends " (n)" before the extension until `candidate` is free in `dir`.
pub fn unique_name(dir: &Path, name: &str) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|s| s.to_str());

    if !dir.join(name).exists() {
        return name.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dot_dot_segments() {
        assert!(split_segments("a/../b").is_err());
    }

    #[test]
    fn rejects_bare_dot_segment() {
        assert!(split_segments("a/./b").is_err());
    }

    #[test]
    fn rejects_backslash() {
        assert!(split_segments("a\\b").is_err());
    }

    #[test]
    fn empty_root_path_is_allowed() {
        assert_eq!(split_segments("").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(split_segments("/a//b/").is_err());
        assert!(split_segments("/a").is_err());
        assert!(split_segments("a/").is_err());
    }

    #[test]
    fn hidden_segment_detection() {
        assert!(has_hidden_segment(&[".secret".to_string()]));
        assert!(!has_hidden_segment(&["public".to_string()]));
    }

    #[test]
    fn unique_name_increments_until_free() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("a (1).txt"), b"x").unwrap();
        assert_eq!(unique_name(dir.path(), "a.txt"), "a (2).txt");
    }
}
