// Cage Extraction
//
// Two ways of unpacking a Cage into a jail root:
// - TarCommand shells out to the host tar(1), as jail hosts normally do
// - NativeExtractor unpacks in-process with the tar and flate2 crates
//
// Both keep entry paths, stored permissions and directory structure.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path};
use tar::Archive;
use tracing::{debug, info};

use super::{run_checked, ArchiveExtractor, HostError};

/// Gzip stream magic
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Host tar(1) extractor
#[derive(Debug, Clone)]
pub struct TarCommand {
    program: String,
}

impl Default for TarCommand {
    fn default() -> Self {
        Self::new("tar")
    }
}

impl TarCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to tar for one extraction
    ///
    /// Compression is detected by tar itself on read.
    pub fn build_args(archive: &Path, dest: &Path) -> Vec<String> {
        vec![
            "-xf".to_string(),
            archive.to_string_lossy().to_string(),
            "-C".to_string(),
            dest.to_string_lossy().to_string(),
        ]
    }
}

impl ArchiveExtractor for TarCommand {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), HostError> {
        info!("Extracting {} into {}", archive.display(), dest.display());
        run_checked(&self.program, Self::build_args(archive, dest))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "tar"
    }
}

/// In-process extractor built on the `tar` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeExtractor;

impl NativeExtractor {
    fn unpack<R: Read>(reader: R, source: &Path, dest: &Path) -> Result<usize, HostError> {
        let mut archive = Archive::new(reader);
        archive.set_preserve_permissions(true);
        archive.set_overwrite(true);

        let mut count = 0;
        let entries = archive.entries().map_err(|e| archive_error(source, e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| archive_error(source, e))?;
            let path = entry.path().map_err(|e| archive_error(source, e))?.into_owned();

            // SECURITY: reject absolute and parent-relative entries up front
            if path.is_absolute()
                || path
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
            {
                return Err(HostError::UnsafeEntry(path.to_string_lossy().to_string()));
            }

            let unpacked = entry.unpack_in(dest).map_err(|e| archive_error(source, e))?;
            if !unpacked {
                return Err(HostError::UnsafeEntry(path.to_string_lossy().to_string()));
            }
            count += 1;
        }

        Ok(count)
    }
}

impl ArchiveExtractor for NativeExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), HostError> {
        info!("Extracting {} into {}", archive.display(), dest.display());
        let to_error = |source| HostError::Archive {
            path: archive.to_path_buf(),
            source,
        };

        let mut file = File::open(archive).map_err(to_error)?;
        let gzip = is_gzip(&mut file).map_err(to_error)?;
        let reader = BufReader::new(file);

        let count = if gzip {
            Self::unpack(GzDecoder::new(reader), archive, dest)?
        } else {
            Self::unpack(reader, archive, dest)?
        };
        debug!("Unpacked {} entries (gzip: {})", count, gzip);
        Ok(())
    }

    fn name(&self) -> &str {
        "native"
    }
}

fn archive_error(archive: &Path, source: io::Error) -> HostError {
    HostError::Archive {
        path: archive.to_path_buf(),
        source,
    }
}

/// Peek at the first bytes of `file` and rewind
fn is_gzip(file: &mut File) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut read = 0;
    while read < magic.len() {
        let n = file.read(&mut magic[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    file.seek(SeekFrom::Start(0))?;
    Ok(read == magic.len() && magic == GZIP_MAGIC)
}
