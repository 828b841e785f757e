use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Binary extensions skipped outright once a file exceeds [`BINARY_SIZE_THRESHOLD`].
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "ico", "bmp", "pdf", "zip", "gz", "tar", "7z", "rar",
    "exe", "dll", "so", "dylib", "bin", "wasm", "class", "jar", "woff", "woff2", "ttf", "otf",
    "mp3", "mp4", "mov", "avi", "sqlite", "db",
];

const BINARY_SIZE_THRESHOLD: u64 = 256 * 1024;

/// A scanned source file, ready for incremental-state comparison and chunking.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub relative_path: String,
    pub content: String,
    pub size: u64,
    pub mtime_ms: u64,
    pub content_hash: String,
}

/// Walks a project root honoring `.gitignore`, caller-supplied exclude
/// globs, and a built-in deny list (dot-directories, oversized binaries).
pub struct FileScanner {
    root: PathBuf,
    excludes: GlobSet,
}

impl FileScanner {
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_excludes(root, &[])
    }

    #[must_use]
    pub fn with_excludes(root: impl AsRef<Path>, exclude_globs: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_globs {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        let excludes = builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap());
        Self {
            root: root.as_ref().to_path_buf(),
            excludes,
        }
    }

    /// Paths of every file that survives the deny list and exclude globs,
    /// in lexicographic order.
    #[must_use]
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !name.starts_with('.') || entry.depth() == 0)
                    .unwrap_or(true)
            })
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|entry| entry.into_path())
            .filter(|path| self.is_admitted(path))
            .collect();
        paths.sort();
        paths
    }

    fn is_admitted(&self, path: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(&self.root) {
            if self.excludes.is_match(relative) {
                return false;
            }
        }
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                if let Ok(meta) = std::fs::metadata(path) {
                    if meta.len() > BINARY_SIZE_THRESHOLD {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Reads every admitted file and builds a [`FileRecord`] for it, in
    /// lexicographic path order. Files that fail to read (permissions,
    /// non-UTF8 content) are skipped, not fatal.
    pub async fn scan_records(&self) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        for path in self.scan() {
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(content) = String::from_utf8(bytes) else {
                continue;
            };
            let meta = tokio::fs::metadata(&path).await?;
            let mtime_ms = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            let relative_path = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let content_hash = format!("{:016x}", xxh3_64(content.as_bytes()));
            records.push(FileRecord {
                path,
                relative_path,
                size: meta.len(),
                mtime_ms,
                content_hash,
                content,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scans_files_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();

        let scanner = FileScanner::new(dir.path());
        let records = scanner.scan_records().await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.relative_path.clone()).collect();
        assert_eq!(names, vec!["a.rs", "b.rs"]);
    }

    #[tokio::test]
    async fn respects_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor/skip.rs"), "fn skip() {}").unwrap();
        std::fs::write(dir.path().join("keep.rs"), "fn keep() {}").unwrap();

        let scanner = FileScanner::with_excludes(dir.path(), &["vendor/**".to_string()]);
        let records = scanner.scan_records().await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.relative_path.clone()).collect();
        assert_eq!(names, vec!["keep.rs"]);
    }

    #[test]
    fn content_hash_is_stable_over_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.rs"), "fn x() {}").unwrap();
        let scanner = FileScanner::new(dir.path());
        let first = scan_hashes(&scanner);
        let second = scan_hashes(&scanner);
        assert_eq!(first, second);
    }

    fn scan_hashes(scanner: &FileScanner) -> String {
        tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(scanner.scan_records())
            .unwrap()
            .into_iter()
            .map(|r| r.content_hash)
            .collect::<Vec<_>>()
            .join(",")
    }
}
