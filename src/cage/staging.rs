// Staging Directory
//
// A scratch tree that becomes the jail root inside the archive. The guard
// owns the directory for the duration of one build and removes it when
// dropped, on success and on every error path.

use rand::distr::Alphanumeric;
use rand::Rng;
use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::DIR_MODE;

/// Prefix of every staging directory name
pub const STAGING_PREFIX: &str = "cage-build-";

/// Length of the random suffix
pub const STAGING_SUFFIX_LEN: usize = 6;

/// Owned staging directory, removed on drop
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create a fresh staging directory under `parent`
    ///
    /// Name collisions are not retried; `create` fails if the directory
    /// already exists.
    pub fn create(parent: &Path) -> io::Result<Self> {
        let path = parent.join(format!("{}{}", STAGING_PREFIX, random_suffix()));
        fs::DirBuilder::new().mode(DIR_MODE).create(&path)?;
        debug!("Created staging directory {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed staging directory {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove staging directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STAGING_SUFFIX_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_dir_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let staging = StagingDir::create(parent.path()).unwrap();
            fs::write(staging.path().join("file"), b"data").unwrap();
            assert!(staging.path().is_dir());
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staging_dir_name() {
        let parent = tempfile::tempdir().unwrap();
        let staging = StagingDir::create(parent.path()).unwrap();
        let name = staging.path().file_name().unwrap().to_str().unwrap();
        let suffix = name.strip_prefix(STAGING_PREFIX).unwrap();
        assert_eq!(suffix.len(), STAGING_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_staging_dir_missing_parent() {
        let parent = tempfile::tempdir().unwrap();
        let missing = parent.path().join("does-not-exist");
        assert!(StagingDir::create(&missing).is_err());
    }
}
