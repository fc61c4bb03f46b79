// Base Filesystem Skeleton
//
// The fixed directory layout and generated files present in every Cage,
// independent of the packaged application.

use std::fs;
use std::io;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;

use super::{DIR_MODE, FILE_MODE};

/// Directories created at the root of every Cage
pub const SKELETON_DIRS: [&str; 10] = [
    "app", "bin", "sbin", "lib", "libexec", "usr/bin", "usr/sbin", "etc", "tmp", "dev",
];

/// Path of the generated resolver configuration, relative to the root
pub const RESOLV_CONF_PATH: &str = "etc/resolv.conf";

/// Resolver configuration baked into every Cage
pub const RESOLV_CONF: &str = "nameserver 8.8.8.8\nnameserver 8.8.4.4\n";

/// Materialise the skeleton under `root`
pub fn create_base_fs(root: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true).mode(DIR_MODE);
    for dir in SKELETON_DIRS {
        builder.create(root.join(dir))?;
    }

    write_file(&root.join(RESOLV_CONF_PATH), RESOLV_CONF.as_bytes(), FILE_MODE)
}

/// Write `contents` to a new file created with `mode`
pub(crate) fn write_file(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_create_base_fs() {
        let root = tempfile::tempdir().unwrap();
        create_base_fs(root.path()).unwrap();

        for dir in SKELETON_DIRS {
            assert!(root.path().join(dir).is_dir(), "missing {dir}");
        }

        let resolv = fs::read_to_string(root.path().join(RESOLV_CONF_PATH)).unwrap();
        assert_eq!(resolv.lines().count(), 2);
        assert!(resolv.lines().all(|l| l.starts_with("nameserver ")));
    }

    #[test]
    fn test_resolv_conf_permissions() {
        let root = tempfile::tempdir().unwrap();
        create_base_fs(root.path()).unwrap();

        let mode = fs::metadata(root.path().join(RESOLV_CONF_PATH))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, FILE_MODE);
    }

    #[test]
    fn test_skeleton_is_identical_across_roots() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        create_base_fs(a.path()).unwrap();
        create_base_fs(b.path()).unwrap();

        assert_eq!(
            fs::read(a.path().join(RESOLV_CONF_PATH)).unwrap(),
            fs::read(b.path().join(RESOLV_CONF_PATH)).unwrap()
        );
    }
}
