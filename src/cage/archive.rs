// Cage Archive Writer
//
// Serialises a staging tree into a tar stream. Entry names are relative to
// the staging root, the root itself is not written, directories come before
// their contents and siblings are written in name order.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::Builder;
use tracing::debug;

/// Compression applied to the tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveCompression {
    None,
    Gzip,
}

impl ArchiveCompression {
    /// Gzip for `.gz`/`.tgz` targets, plain tar otherwise
    pub fn for_target(target: &Path) -> Self {
        match target.extension().and_then(|e| e.to_str()) {
            Some("gz") | Some("tgz") => Self::Gzip,
            _ => Self::None,
        }
    }
}

/// Counts reported after writing an archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Number of tar entries written (directories and files)
    pub entries: usize,
    /// Number of regular file entries
    pub files: usize,
}

/// Write the tree under `root` to `writer` as a tar stream
pub fn write_tree<W: Write>(root: &Path, writer: W) -> io::Result<ArchiveStats> {
    let mut builder = Builder::new(writer);
    builder.follow_symlinks(false);

    let mut stats = ArchiveStats::default();
    append_children(&mut builder, root, Path::new(""), &mut stats)?;
    builder.finish()?;
    Ok(stats)
}

/// Write the tree under `root` into an already created archive file
pub fn write_archive_file(
    root: &Path,
    file: File,
    compression: ArchiveCompression,
) -> io::Result<ArchiveStats> {
    let mut out = BufWriter::new(file);

    let stats = match compression {
        ArchiveCompression::None => write_tree(root, &mut out)?,
        ArchiveCompression::Gzip => {
            let mut encoder = GzEncoder::new(&mut out, Compression::default());
            let stats = write_tree(root, &mut encoder)?;
            encoder.try_finish()?;
            stats
        }
    };

    out.flush()?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    debug!("Wrote {} entries ({} files)", stats.entries, stats.files);
    Ok(stats)
}

fn append_children<W: Write>(
    builder: &mut Builder<W>,
    dir: &Path,
    prefix: &Path,
    stats: &mut ArchiveStats,
) -> io::Result<()> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    children.sort();

    for child in children {
        let Some(name) = child.file_name() else {
            continue;
        };
        let entry_name = prefix.join(name);
        let file_type = fs::symlink_metadata(&child)?.file_type();

        if file_type.is_dir() {
            builder.append_dir(&entry_name, &child)?;
            stats.entries += 1;
            append_children(builder, &child, &entry_name, stats)?;
        } else if file_type.is_file() {
            builder.append_path_with_name(&child, &entry_name)?;
            stats.entries += 1;
            stats.files += 1;
        }
    }

    Ok(())
}
