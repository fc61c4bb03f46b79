// Configuration File Support
//
// Defaults for the command layer, read from TOML with environment variable
// overrides. Configuration files are loaded from the XDG config directory:
// ~/.config/jailpack/config.toml
//
// The builder and runner never read this; main.rs turns it into explicit
// parameters.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cage::{BuildOptions, DEFAULT_SAFE_ROOTS};
use crate::host::jail::DEFAULT_DEVFS_RULESET;
use crate::host::{ArchiveExtractor, NativeExtractor, TarCommand};
use crate::runner::{DEFAULT_JAILS_DIR, DEFAULT_JAIL_IP, DEFAULT_JAIL_NAME};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Cage build configuration
    pub build: BuildConfig,

    /// Jail run configuration
    pub run: RunConfig,

    /// Host tool locations
    pub host: HostConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Cage build configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Absolute paths accepted for application directories and targets
    pub safe_roots: Vec<PathBuf>,

    /// Where staging directories are created (system temp dir if unset)
    pub staging_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            safe_roots: DEFAULT_SAFE_ROOTS.iter().map(PathBuf::from).collect(),
            staging_dir: None,
        }
    }
}

/// Extraction backend for `run`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Host tar(1)
    #[default]
    Host,
    /// Built-in tar reader
    Native,
}

impl std::str::FromStr for ExtractorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "native" => Ok(Self::Native),
            _ => anyhow::bail!("Invalid extractor: {}. Must be 'host' or 'native'", s),
        }
    }
}

/// Jail run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Parent directory of jail roots
    pub jails_dir: PathBuf,

    /// Jail name when --name is not given
    pub default_name: String,

    /// Jail IPv4 address when --ip is not given
    pub default_ip: String,

    /// devfs ruleset applied to every jail
    pub devfs_ruleset: u32,

    /// Extraction backend
    pub extractor: ExtractorKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jails_dir: PathBuf::from(DEFAULT_JAILS_DIR),
            default_name: DEFAULT_JAIL_NAME.to_string(),
            default_ip: DEFAULT_JAIL_IP.to_string(),
            devfs_ruleset: DEFAULT_DEVFS_RULESET,
            extractor: ExtractorKind::Host,
        }
    }
}

/// Host tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// tar(1) executable
    pub tar: String,

    /// jail(8) executable
    pub jail: String,

    /// jls(8) executable
    pub jls: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tar: "tar".to_string(),
            jail: "jail".to_string(),
            jls: "jls".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/jailpack/config.toml` on Linux and FreeBSD
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("org", "jailpack", "jailpack") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("jailpack")
                .join("config.toml")
        }
    }

    /// Apply variable overrides looked up through `lookup`
    ///
    /// Recognised variables:
    /// - JAILPACK_LOG_LEVEL
    /// - JAILPACK_LOG_FORMAT
    /// - JAILPACK_JAILS_DIR
    /// - JAILPACK_EXTRACTOR
    /// - JAILPACK_STAGING_DIR
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("JAILPACK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("JAILPACK_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(dir) = lookup("JAILPACK_JAILS_DIR") {
            self.run.jails_dir = PathBuf::from(dir);
        }
        if let Some(extractor) = lookup("JAILPACK_EXTRACTOR") {
            match extractor.parse() {
                Ok(kind) => self.run.extractor = kind,
                Err(e) => tracing::warn!("Ignoring JAILPACK_EXTRACTOR: {}", e),
            }
        }
        if let Some(dir) = lookup("JAILPACK_STAGING_DIR") {
            self.build.staging_dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if let Some(root) = self.build.safe_roots.iter().find(|r| !r.is_absolute()) {
            anyhow::bail!("Safe root must be an absolute path: {:?}", root);
        }

        if !self.run.jails_dir.is_absolute() {
            anyhow::bail!("Jails directory must be an absolute path: {:?}", self.run.jails_dir);
        }

        for (name, program) in [
            ("tar", &self.host.tar),
            ("jail", &self.host.jail),
            ("jls", &self.host.jls),
        ] {
            if program.is_empty() {
                anyhow::bail!("Host program for '{}' is empty", name);
            }
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Build options derived from the `[build]` section
    pub fn build_options(&self) -> BuildOptions {
        let options = BuildOptions::default().with_safe_roots(self.build.safe_roots.clone());
        match &self.build.staging_dir {
            Some(dir) => options.with_staging_parent(dir.clone()),
            None => options,
        }
    }

    /// Extractor selected by `kind`
    pub fn extractor(&self, kind: ExtractorKind) -> Box<dyn ArchiveExtractor> {
        match kind {
            ExtractorKind::Host => Box::new(TarCommand::new(&self.host.tar)),
            ExtractorKind::Native => Box::new(NativeExtractor),
        }
    }
}
