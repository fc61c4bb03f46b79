// Cage Runner
//
// Turns a built Cage into a running jail.
//
// Run flow:
// 1. Validate archive path, jail root, jail name and IP (no side effects yet)
// 2. Create the jail root directory
// 3. Extract the Cage into the jail root
// 4. Create the jail with jail(8) and wait for it to return
//
// Nothing is retried. A second run with the same jail name reuses and
// overwrites the same jail root.


use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cage::DIR_MODE;
use crate::host::{ArchiveExtractor, HostError, JailController, JailSpec};
use crate::validate::{validate_ipv4_shape, validate_jail_name, PathPolicy, ValidationError};

/// Parent directory of jail roots
pub const DEFAULT_JAILS_DIR: &str = "/usr/jails";

/// Jail name used when none is given
pub const DEFAULT_JAIL_NAME: &str = "cage-app";

/// Jail address used when none is given
pub const DEFAULT_JAIL_IP: &str = "10.0.0.10";

/// Error types for running a Cage
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid cage file path: {0}")]
    InvalidArchive(#[source] ValidationError),

    #[error("invalid jail directory path: {0}")]
    InvalidJailRoot(#[source] ValidationError),

    #[error("invalid jail name: {0}")]
    InvalidName(#[source] ValidationError),

    #[error("invalid IP address: {0}")]
    InvalidIp(#[source] ValidationError),

    #[error("failed to create jail root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("extract failed: {0}")]
    Extract(#[source] HostError),

    #[error("jail start failed: {0}")]
    JailStart(#[source] HostError),
}

impl RunError {
    /// True if the request was rejected before touching the host
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArchive(_)
                | Self::InvalidJailRoot(_)
                | Self::InvalidName(_)
                | Self::InvalidIp(_)
        )
    }
}

/// Parameters of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub archive: PathBuf,
    pub jail_root: PathBuf,
    pub name: String,
    pub ip: String,
    pub devfs_ruleset: u32,
}

impl RunRequest {
    pub fn new(
        archive: impl Into<PathBuf>,
        jail_root: impl Into<PathBuf>,
        name: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            archive: archive.into(),
            jail_root: jail_root.into(),
            name: name.into(),
            ip: ip.into(),
            devfs_ruleset: crate::host::jail::DEFAULT_DEVFS_RULESET,
        }
    }

    pub fn with_devfs_ruleset(mut self, ruleset: u32) -> Self {
        self.devfs_ruleset = ruleset;
        self
    }

    /// Check every precondition without side effects
    pub fn validate(&self) -> Result<(), RunError> {
        let policy = PathPolicy::relaxed();
        policy
            .check(&self.archive)
            .map_err(RunError::InvalidArchive)?;
        policy
            .check(&self.jail_root)
            .map_err(RunError::InvalidJailRoot)?;
        validate_jail_name(&self.name).map_err(RunError::InvalidName)?;
        validate_ipv4_shape(&self.ip).map_err(RunError::InvalidIp)?;
        Ok(())
    }

    /// Jail description handed to the controller
    pub fn jail_spec(&self) -> JailSpec {
        JailSpec::new(&self.name, &self.jail_root, &self.ip).with_devfs_ruleset(self.devfs_ruleset)
    }
}

/// Root directory of the jail called `name` under `jails_dir`
///
/// Stays under `jails_dir` only for names accepted by
/// [`validate_jail_name`], which `RunRequest::validate` enforces.
pub fn jail_root_for(jails_dir: &Path, name: &str) -> PathBuf {
    jails_dir.join(name)
}

/// Extracts Cages and starts jails through the given host facilities
pub struct CageRunner<E, J> {
    extractor: E,
    controller: J,
}

impl<E: ArchiveExtractor, J: JailController> CageRunner<E, J> {
    pub fn new(extractor: E, controller: J) -> Self {
        Self {
            extractor,
            controller,
        }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn controller(&self) -> &J {
        &self.controller
    }

    /// Extract `request.archive` into the jail root and start the jail
    pub fn run(&self, request: &RunRequest) -> Result<(), RunError> {
        request.validate()?;

        fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(&request.jail_root)
            .map_err(|source| RunError::CreateRoot {
                path: request.jail_root.clone(),
                source,
            })?;
        debug!("Jail root ready at {}", request.jail_root.display());

        self.extractor
            .extract(&request.archive, &request.jail_root)
            .map_err(RunError::Extract)?;
        debug!(
            "Extracted {} with {} extractor",
            request.archive.display(),
            self.extractor.name()
        );

        let spec = request.jail_spec();
        self.controller.start(&spec).map_err(RunError::JailStart)?;

        info!(
            "Jail {} running at {} from {}",
            request.name,
            request.ip,
            request.jail_root.display()
        );
        Ok(())
    }
}
