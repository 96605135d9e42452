use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Stages in-memory upload buffers as named files on disk so they can be
/// handed to tooling that expects a path.
///
/// The staging directory is explicit rather than ambient process state, which
/// keeps tests hermetic and lets deployments point staging at fast local
/// storage.
#[derive(Debug, Clone)]
pub struct TempStaging {
    dir: PathBuf,
}

impl TempStaging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Staging backed by the OS temp directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` into a freshly created temp file and returns its path.
    ///
    /// The suffix is taken from `filename`'s extension (everything after the
    /// last `.`), defaulting to `.jpg` for extension-less names since camera
    /// captures arrive without one. The file is not auto-deleted; the caller
    /// owns the path until it passes it to [`cleanup_temp_files`].
    ///
    /// [`cleanup_temp_files`]: TempStaging::cleanup_temp_files
    pub fn create_temp_file(&self, bytes: &[u8], filename: &str) -> std::io::Result<PathBuf> {
        let suffix = temp_suffix(filename);
        let mut file = tempfile::Builder::new()
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        let (file, path) = file.keep().map_err(|e| e.error)?;
        drop(file);
        Ok(path)
    }

    /// Best-effort removal of staged files.
    ///
    /// A path that is already gone is a no-op, so the call is idempotent.
    /// Other failures (e.g. permissions) are logged at `warn` and swallowed:
    /// a leaked temp file must never mask the result of the request that
    /// produced it.
    pub fn cleanup_temp_files<P: AsRef<Path>>(&self, paths: &[P]) {
        for path in paths {
            let path = path.as_ref();
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove temp file {}: {}", path.display(), e),
            }
        }
    }
}

/// Suffix for a staged file: substring after the last `.`, else `.jpg`.
fn temp_suffix(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => filename[idx..].to_string(),
        None => ".jpg".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging() -> (tempfile::TempDir, TempStaging) {
        let dir = tempfile::tempdir().unwrap();
        let staging = TempStaging::new(dir.path());
        (dir, staging)
    }

    #[test]
    fn test_round_trip() {
        let (_guard, staging) = staging();
        let content = b"%PDF-1.4 not really a pdf";

        let path = staging.create_temp_file(content, "scan.pdf").unwrap();
        assert!(path.exists());
        assert_eq!(fs::read(&path).unwrap(), content);

        staging.cleanup_temp_files(&[&path]);
        assert!(!path.exists());
    }

    #[test]
    fn test_suffix_from_extension() {
        let (_guard, staging) = staging();

        let path = staging.create_temp_file(b"x", "report.final.pdf").unwrap();
        assert_eq!(path.extension().unwrap(), "pdf");

        let path = staging.create_temp_file(b"x", "archive.tar.gz").unwrap();
        assert_eq!(path.extension().unwrap(), "gz");
    }

    #[test]
    fn test_suffix_defaults_to_jpg() {
        let (_guard, staging) = staging();
        let path = staging.create_temp_file(b"x", "camera_capture").unwrap();
        assert_eq!(path.extension().unwrap(), "jpg");
    }

    #[test]
    fn test_empty_buffer() {
        let (_guard, staging) = staging();
        let path = staging.create_temp_file(b"", "empty.png").unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 0);
        staging.cleanup_temp_files(&[path]);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let (_guard, staging) = staging();
        let p1 = staging.create_temp_file(b"a", "a.txt").unwrap();
        let p2 = staging.create_temp_file(b"b", "b.txt").unwrap();

        let paths = vec![p1, p2];
        staging.cleanup_temp_files(&paths);
        // Second pass over the same (now missing) paths must not panic.
        staging.cleanup_temp_files(&paths);
    }

    #[test]
    fn test_cleanup_ignores_unknown_paths() {
        let (_guard, staging) = staging();
        staging.cleanup_temp_files(&[PathBuf::from("/nonexistent/never-created.jpg")]);
    }

    #[test]
    fn test_concurrent_files_do_not_collide() {
        let (_guard, staging) = staging();
        let a = staging.create_temp_file(b"a", "same.jpg").unwrap();
        let b = staging.create_temp_file(b"b", "same.jpg").unwrap();
        assert_ne!(a, b);
        staging.cleanup_temp_files(&[a, b]);
    }
}
