//! On-the-fly ZIP archive building for `download-zip` and
//! `download-zip-batch`. The `zip` crate is synchronous, so archives are
//! built on a blocking task; cancellation is checked between every entry and
//! every chunk so a revoked device never finishes a large archive it started.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::error::ApiError;
use crate::paths::unique_name;
use mediabus_core::TransferTicket;

const CHUNK: usize = 64 * 1024;

/// Zips the contents of `dir` (not the directory itself) with entries sorted
/// by lowercased full path so output is deterministic regardless of
/// filesystem iteration order.
pub async fn zip_directory(dir: &Path, show_hidden: bool, ticket: &TransferTicket) -> Result<Vec<u8>, ApiError> {
    let entries = collect_entries(dir, show_hidden)?;
    build(entries, ticket).await
}

/// Zips an explicit selection of files/directories, de-duplicating top-level
/// entry names the way the shared folder itself de-duplicates uploads.
pub async fn zip_entries(
    selection: &[(String, PathBuf)],
    show_hidden: bool,
    ticket: &TransferTicket,
) -> Result<Vec<u8>, ApiError> {
    let mut entries = Vec::new();
    let mut seen_root = std::collections::HashSet::new();
    for (label, path) in selection {
        let unique_label = {
            let mut candidate = label.clone();
            let mut n = 1u32;
            while seen_root.contains(&candidate) {
                candidate = format!("{label} ({n})");
                n += 1;
            }
            candidate
        };
        seen_root.insert(unique_label.clone());

        if path.is_dir() {
            entries.push((format!("{unique_label}/"), path.clone(), true));
            for (zip_path, fs_path, is_dir) in collect_entries(path, show_hidden)? {
                entries.push((format!("{unique_label}/{zip_path}"), fs_path, is_dir));
            }
        } else {
            entries.push((unique_label, path.clone(), false));
        }
    }
    build(entries, ticket).await
}

/// Walks `dir` and returns every descendant, directories included, sorted by
/// lowercased full path (a directory's trailing `/` sorts before any of its
/// children, since `/` precedes every other path-segment character).
/// Directory entries carry no readable content; `write_archive` emits them
/// with `add_directory` instead of streaming bytes.
fn collect_entries(dir: &Path, show_hidden: bool) -> Result<Vec<(String, PathBuf, bool)>, ApiError> {
    let mut entries = Vec::new();
    for walked in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        let path = walked.path();
        if path == dir {
            continue;
        }
        let relative = match path.strip_prefix(dir) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if !show_hidden && relative.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.')) {
            continue;
        }
        let is_dir = path.is_dir();
        let mut zip_path = relative.to_string_lossy().replace('\\', "/");
        if is_dir {
            zip_path.push('/');
        }
        entries.push((zip_path, path.to_path_buf(), is_dir));
    }
    entries.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));
    Ok(entries)
}

async fn build(entries: Vec<(String, PathBuf, bool)>, ticket: &TransferTicket) -> Result<Vec<u8>, ApiError> {
    let mut used_names = std::collections::HashSet::new();
    let mut deduped = Vec::with_capacity(entries.len());
    for (zip_path, fs_path, is_dir) in entries {
        let final_path = if used_names.contains(&zip_path) {
            let parent = Path::new(&zip_path).parent().unwrap_or(Path::new(""));
            let name = Path::new(&zip_path).file_name().and_then(|n| n.to_str()).unwrap_or(&zip_path);
            let mut candidate = unique_name(parent, name);
            while used_names.contains(&candidate) {
                candidate = unique_name(parent, &candidate);
            }
            parent.join(&candidate).to_string_lossy().replace('\\', "/")
        } else {
            zip_path
        };
        used_names.insert(final_path.clone());
        deduped.push((final_path, fs_path, is_dir));
    }

    write_archive(deduped, ticket).await
}

async fn write_archive(entries: Vec<(String, PathBuf, bool)>, ticket: &TransferTicket) -> Result<Vec<u8>, ApiError> {
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(cursor);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (zip_path, fs_path, is_dir) in &entries {
        if ticket.cancelled().await {
            return Err(ApiError::ClientAborted);
        }
        if *is_dir {
            writer.add_directory(zip_path, options).map_err(|e| ApiError::internal(e.to_string()))?;
            continue;
        }
        writer.start_file(zip_path, options).map_err(|e| ApiError::internal(e.to_string()))?;
        let mut input = std::fs::File::open(fs_path)?;
        let mut buf = vec![0u8; CHUNK];
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).map_err(|e| ApiError::internal(e.to_string()))?;
            ticket.add_progress(n as u64).await;
        }
    }
    let cursor = writer.finish().map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_sort_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Banana.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("apple.txt"), b"a").unwrap();
        let entries = collect_entries(dir.path(), true).unwrap();
        let names: Vec<_> = entries.into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["apple.txt".to_string(), "Banana.txt".to_string()]);
    }

    #[test]
    fn hidden_files_excluded_unless_shown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".secret"), b"s").unwrap();
        std::fs::write(dir.path().join("visible.txt"), b"v").unwrap();
        let hidden_excluded = collect_entries(dir.path(), false).unwrap();
        assert_eq!(hidden_excluded.len(), 1);
        let hidden_included = collect_entries(dir.path(), true).unwrap();
        assert_eq!(hidden_included.len(), 2);
    }

    #[test]
    fn directories_are_emitted_with_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("file.txt"), b"x").unwrap();
        let entries = collect_entries(dir.path(), true).unwrap();
        let names: Vec<_> = entries.into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["sub/".to_string(), "sub/file.txt".to_string()]);
    }

    #[test]
    fn empty_directories_are_included() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        let entries = collect_entries(dir.path(), true).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "empty/");
        assert!(entries[0].2);
    }
}
