// Cage Archive Builder
//
// Packages an application directory into a Cage: a tar archive holding a
// minimal root filesystem, the application under /app and a startup script.
//
// Build flow:
// 1. Validate the application and target paths
// 2. Create a uniquely named staging directory
// 3. Materialise the base filesystem skeleton
// 4. Copy the application tree into app/
// 5. Write app-start.sh
// 6. Serialise the staging tree into the target archive
//
// The staging directory is removed before `build_cage` returns, whether the
// build succeeded or not.

pub mod archive;
pub mod script;
pub mod skeleton;
pub mod staging;


use std::fmt;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::validate::{PathPolicy, ValidationError};
use archive::{write_archive_file, ArchiveCompression};
use script::{START_SCRIPT, START_SCRIPT_MODE, START_SCRIPT_NAME};
use skeleton::{create_base_fs, write_file};
use staging::StagingDir;

/// Permission bits for directories in the staging tree
pub const DIR_MODE: u32 = 0o750;

/// Permission bits for regular files in the staging tree
pub const FILE_MODE: u32 = 0o600;

/// Default allow-list for absolute build paths
pub const DEFAULT_SAFE_ROOTS: [&str; 2] = ["/tmp", "/usr/jails"];

/// Default archive name used by the CLI
pub const DEFAULT_CAGE_NAME: &str = "app.cage.tar.gz";

/// Build step that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Staging,
    BaseFilesystem,
    CopyApplication,
    StartScript,
    CreateTarget,
    Archive,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Staging => "staging",
            Self::BaseFilesystem => "base filesystem",
            Self::CopyApplication => "copy application",
            Self::StartScript => "startup script",
            Self::CreateTarget => "create target",
            Self::Archive => "archive",
        };
        f.write_str(phase)
    }
}

/// Error types for Cage builds
#[derive(Debug, thiserror::Error)]
pub enum CageError {
    #[error("invalid app directory path: {0}")]
    InvalidAppDir(#[source] ValidationError),

    #[error("invalid target path: {0}")]
    InvalidTarget(#[source] ValidationError),

    #[error("app directory is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("{phase} failed: {source}")]
    Io {
        phase: BuildPhase,
        #[source]
        source: io::Error,
    },
}

impl CageError {
    /// Phase that failed, for filesystem errors
    pub fn phase(&self) -> Option<BuildPhase> {
        match self {
            Self::Io { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Tag an I/O result with the build phase it belongs to
trait PhaseExt<T> {
    fn phase(self, phase: BuildPhase) -> Result<T, CageError>;
}

impl<T> PhaseExt<T> for io::Result<T> {
    fn phase(self, phase: BuildPhase) -> Result<T, CageError> {
        self.map_err(|source| CageError::Io { phase, source })
    }
}

/// Options for a Cage build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Policy for the application and target paths
    pub path_policy: PathPolicy,

    /// Directory in which the staging tree is created
    pub staging_parent: PathBuf,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            path_policy: PathPolicy::with_safe_roots(DEFAULT_SAFE_ROOTS),
            staging_parent: std::env::temp_dir(),
        }
    }
}

impl BuildOptions {
    /// Set the absolute-path allow-list
    pub fn with_safe_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.path_policy = PathPolicy::with_safe_roots(roots);
        self
    }

    /// Set the staging parent directory
    pub fn with_staging_parent(mut self, parent: PathBuf) -> Self {
        self.staging_parent = parent;
        self
    }
}

/// Result of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CageSummary {
    pub target: PathBuf,
    pub compression: ArchiveCompression,
    /// Tar entries written, directories included
    pub entries: usize,
    /// Regular files copied from the application directory
    pub payload_files: usize,
}

/// Build a Cage from `app_dir` and write it to `target`
pub fn build_cage(
    app_dir: &Path,
    target: &Path,
    options: &BuildOptions,
) -> Result<CageSummary, CageError> {
    options
        .path_policy
        .check(app_dir)
        .map_err(CageError::InvalidAppDir)?;
    options
        .path_policy
        .check(target)
        .map_err(CageError::InvalidTarget)?;

    if !app_dir.is_dir() {
        return Err(CageError::NotADirectory(app_dir.to_path_buf()));
    }

    info!("Building Cage from {}", app_dir.display());

    let staging = StagingDir::create(&options.staging_parent).phase(BuildPhase::Staging)?;
    let root = staging.path();

    create_base_fs(root).phase(BuildPhase::BaseFilesystem)?;

    let payload_files = copy_app(app_dir, &root.join("app")).phase(BuildPhase::CopyApplication)?;
    debug!("Copied {} application files", payload_files);

    write_file(
        &root.join(START_SCRIPT_NAME),
        START_SCRIPT.as_bytes(),
        START_SCRIPT_MODE,
    )
    .phase(BuildPhase::StartScript)?;

    let compression = ArchiveCompression::for_target(target);
    let file = File::create(target).phase(BuildPhase::CreateTarget)?;
    let stats = write_archive_file(root, file, compression).phase(BuildPhase::Archive)?;

    info!(
        "Cage created at {} ({} entries)",
        target.display(),
        stats.entries
    );

    Ok(CageSummary {
        target: target.to_path_buf(),
        compression,
        entries: stats.entries,
        payload_files,
    })
}

/// Recursively copy `src` into `dst`, returning the number of files copied
///
/// Files are written with `FILE_MODE` and directories with `DIR_MODE`.
/// Symbolic links are skipped so nothing outside `src` ends up in the Cage.
pub fn copy_app(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true).mode(DIR_MODE);
    builder.create(dst)?;

    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            warn!("Skipping symbolic link {}", from.display());
        } else if file_type.is_dir() {
            copied += copy_app(&from, &to)?;
        } else if file_type.is_file() {
            let data = fs::read(&from)?;
            write_file(&to, &data, FILE_MODE)?;
            copied += 1;
        } else {
            warn!("Skipping special file {}", from.display());
        }
    }

    Ok(copied)
}
