//! Shared clone-tree traversal policy.
//!
//! Deny-listed directories are pruned wholesale; unreadable or non-UTF-8
//! files are skipped silently.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::patterns::{SCAN_EXTENSIONS, SKIP_DIRS};

fn is_kept(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .map_or(true, |name| !SKIP_DIRS.contains(&name))
}

fn has_scan_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SCAN_EXTENSIONS.contains(&ext))
}

fn walk(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(is_kept)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
}

/// Files whose extension is on the scan allow-list (tool extraction and
/// exposure analysis).
pub fn source_files(root: &Path) -> Vec<PathBuf> {
    walk(root).filter(|p| has_scan_extension(p)).collect()
}

/// Every readable file outside deny-listed directories (the auth check also
/// inspects dotfiles, configs and anything else that might carry secrets).
pub fn all_files(root: &Path) -> Vec<PathBuf> {
    walk(root).collect()
}

/// Read a file as UTF-8, or `None` if it cannot be read as text.
pub fn read_text(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn deny_listed_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "x").unwrap();
        fs::write(dir.path().join("index.ts"), "x").unwrap();

        let files = source_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("index.ts"));
    }

    #[test]
    fn extension_filter_applies_only_to_source_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/").unwrap();
        fs::write(dir.path().join("server.py"), "x").unwrap();

        assert_eq!(source_files(dir.path()).len(), 1);
        assert_eq!(all_files(dir.path()).len(), 2);
    }
}
