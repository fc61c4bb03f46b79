// Jail Configuration and Control
//
// A jail is described as an ordered list of jail(8) parameters. Each
// parameter stays a key/value pair until the moment the command line is
// assembled, so no caller ever concatenates argument strings by hand.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{run_checked, HostError, JailController, JailLister};
use crate::cage::script::START_SCRIPT_JAIL_PATH;

/// devfs ruleset applied when none is configured
pub const DEFAULT_DEVFS_RULESET: u32 = 4;

/// Single jail(8) parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JailParam {
    pub key: String,
    pub value: Option<String>,
}

impl JailParam {
    /// `key=value` parameter
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Boolean parameter given by its key alone
    pub fn flag(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

impl fmt::Display for JailParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => f.write_str(&self.key),
        }
    }
}

/// Description of a jail to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JailSpec {
    name: String,
    path: PathBuf,
    ip4: String,
    devfs_ruleset: u32,
}

impl JailSpec {
    /// Jail running the Cage startup script with devfs mounted
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, ip4: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ip4: ip4.into(),
            devfs_ruleset: DEFAULT_DEVFS_RULESET,
        }
    }

    /// Set the devfs ruleset id
    pub fn with_devfs_ruleset(mut self, ruleset: u32) -> Self {
        self.devfs_ruleset = ruleset;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ip4(&self) -> &str {
        &self.ip4
    }

    /// Parameters in the order they are passed to jail(8)
    pub fn params(&self) -> Vec<JailParam> {
        vec![
            JailParam::new("name", &self.name),
            JailParam::new("path", self.path.to_string_lossy()),
            JailParam::new("ip4", &self.ip4),
            JailParam::new("exec.start", START_SCRIPT_JAIL_PATH),
            JailParam::flag("mount.devfs"),
            JailParam::new("devfs_ruleset", self.devfs_ruleset.to_string()),
        ]
    }

    /// Command-line arguments for `jail`
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-c".to_string()];
        args.extend(self.params().iter().map(ToString::to_string));
        args
    }
}

/// jail(8) backed controller
#[derive(Debug, Clone)]
pub struct JailCommand {
    program: String,
}

impl Default for JailCommand {
    fn default() -> Self {
        Self::new("jail")
    }
}

impl JailCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl JailController for JailCommand {
    fn start(&self, spec: &JailSpec) -> Result<(), HostError> {
        info!("Starting jail {} (IP: {})", spec.name(), spec.ip4());
        run_checked(&self.program, spec.build_args())?;
        Ok(())
    }
}

/// jls(8) backed lister
#[derive(Debug, Clone)]
pub struct JlsCommand {
    program: String,
}

impl Default for JlsCommand {
    fn default() -> Self {
        Self::new("jls")
    }
}

impl JlsCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl JailLister for JlsCommand {
    fn list(&self) -> Result<String, HostError> {
        let output = run_checked(&self.program, std::iter::empty::<&str>())?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
