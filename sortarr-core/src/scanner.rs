use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::default_video_extensions_vec;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("directory does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct MediaScanner {
    /// Supported video file extensions, lower-case
    pub video_extensions: Vec<String>,
    /// Whether to follow symbolic links
    pub follow_links: bool,
    /// Subtree left alone, usually the library being sorted into
    pub exclude: Option<PathBuf>,
}

impl Default for MediaScanner {
    fn default() -> Self {
        Self {
            video_extensions: default_video_extensions_vec(),
            follow_links: false,
            exclude: None,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ScanResult {
    pub total_files: usize,
    /// Video files in path order
    pub video_files: Vec<PathBuf>,
    pub skipped_files: usize,
    pub errors: Vec<String>,
}

impl MediaScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.video_extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Skip everything below `dir`, e.g. a destination nested in the source.
    pub fn excluding(mut self, dir: impl AsRef<Path>) -> Self {
        self.exclude = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn is_video_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| self.video_extensions.contains(&ext))
    }

    pub fn scan_directory<P: AsRef<Path>>(&self, root_path: P) -> Result<ScanResult, ScanError> {
        let root_path = root_path.as_ref();
        info!("Starting media scan of: {}", root_path.display());

        if !root_path.exists() {
            return Err(ScanError::NotFound(root_path.to_path_buf()));
        }
        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut result = ScanResult::default();
        let walker = WalkDir::new(root_path)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry));

        for entry in walker {
            match entry {
                Ok(entry) => self.process_entry(&entry, &mut result),
                Err(e) => {
                    warn!("Error walking directory: {}", e);
                    result.errors.push(format!("Directory walk error: {}", e));
                }
            }
        }

        info!(
            "Scan complete: {} total files, {} video files, {} skipped, {} errors",
            result.total_files,
            result.video_files.len(),
            result.skipped_files,
            result.errors.len()
        );
        Ok(result)
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        self.exclude
            .as_deref()
            .is_some_and(|excluded| entry.depth() > 0 && entry.path().starts_with(excluded))
    }

    fn process_entry(&self, entry: &DirEntry, result: &mut ScanResult) {
        if entry.file_type().is_dir() {
            return;
        }

        result.total_files += 1;
        let path = entry.path();
        if !self.is_video_file(path) {
            debug!("Skipping non-video file: {}", path.display());
            result.skipped_files += 1;
            return;
        }

        debug!("Found video file: {}", path.display());
        result.video_files.push(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_video_file() {
        let scanner = MediaScanner::new();

        assert!(scanner.is_video_file(Path::new("movie.mp4")));
        assert!(scanner.is_video_file(Path::new("movie.MKV")));
        assert!(!scanner.is_video_file(Path::new("document.txt")));
        assert!(!scanner.is_video_file(Path::new("no_extension")));
    }

    #[test]
    fn test_scan_directory_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("Show/Season 1")).unwrap();
        fs::write(root.join("b.mkv"), "").unwrap();
        fs::write(root.join("a.mp4"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();
        fs::write(root.join("Show/Season 1/Show.S01E01.mkv"), "").unwrap();

        let result = MediaScanner::new().scan_directory(root).unwrap();

        assert_eq!(result.total_files, 4);
        assert_eq!(result.skipped_files, 1);
        assert_eq!(
            result.video_files,
            vec![
                root.join("Show/Season 1/Show.S01E01.mkv"),
                root.join("a.mp4"),
                root.join("b.mkv"),
            ]
        );
    }

    #[test]
    fn test_scan_skips_excluded_destination() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("library/Movies")).unwrap();
        fs::write(root.join("library/Movies/sorted.mkv"), "").unwrap();
        fs::write(root.join("new.mkv"), "").unwrap();

        let result = MediaScanner::new()
            .excluding(root.join("library"))
            .scan_directory(root)
            .unwrap();

        assert_eq!(result.video_files, vec![root.join("new.mkv")]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert_eq!(
            MediaScanner::new().scan_directory(&missing).unwrap_err(),
            ScanError::NotFound(missing)
        );
    }
}
