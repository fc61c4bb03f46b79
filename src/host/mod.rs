// Host Facilities
//
// The runner and status reporter never talk to the operating system
// directly. Extraction, jail creation and jail listing go through the
// capability traits below so the orchestration can be exercised against
// fakes on hosts without jail(8).
//
// Implementations:
// - TarCommand / NativeExtractor: unpack a Cage into a jail root
// - JailCommand: `jail -c` with structured parameters
// - JlsCommand: `jls`

pub mod extract;
pub mod jail;

pub use extract::{NativeExtractor, TarCommand};
pub use jail::{JailCommand, JailParam, JailSpec, JlsCommand};

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Error types for host facility invocations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to invoke {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {}{}", exit_code_display(.code), stderr_display(.stderr))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to read archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive entry escapes the destination: {0}")]
    UnsafeEntry(String),
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn stderr_display(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Unpacks a Cage archive into a directory
pub trait ArchiveExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), HostError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Creates and starts jails
pub trait JailController {
    fn start(&self, spec: &JailSpec) -> Result<(), HostError>;
}

/// Reports running jails
pub trait JailLister {
    /// Raw listing as printed by the host tool
    fn list(&self) -> Result<String, HostError>;
}

impl<T: ArchiveExtractor + ?Sized> ArchiveExtractor for Box<T> {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), HostError> {
        (**self).extract(archive, dest)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Run `program` with `args`, waiting for it to exit
///
/// Returns the captured output on a zero exit status and `HostError::Failed`
/// with the trimmed stderr otherwise.
pub(crate) fn run_checked<I, S>(program: &str, args: I) -> Result<Output, HostError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    debug!("Executing: {:?}", command);

    let output = command.output().map_err(|source| HostError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(HostError::Failed {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}
