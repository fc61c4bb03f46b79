use assert_cmd::Command;
use flate2::read::GzDecoder;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

/// Command with an isolated config file and no JAILPACK_* overrides
fn jailpack(workdir: &Path, config: &str) -> Command {
    let config_path = workdir.join("jailpack.toml");
    fs::write(&config_path, config).unwrap();

    let mut cmd = Command::cargo_bin("jailpack").unwrap();
    cmd.current_dir(workdir)
        .arg("--config")
        .arg(&config_path)
        .env_remove("JAILPACK_LOG_LEVEL")
        .env_remove("JAILPACK_LOG_FORMAT")
        .env_remove("JAILPACK_JAILS_DIR")
        .env_remove("JAILPACK_EXTRACTOR")
        .env_remove("JAILPACK_STAGING_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// Temp workspace with `myapp/main.py` and a staging directory
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("myapp")).unwrap();
    fs::write(dir.path().join("myapp/main.py"), b"print('hello')\n").unwrap();
    fs::create_dir(dir.path().join("staging")).unwrap();
    dir
}

fn config_with(dir: &Path, extra: &str) -> String {
    format!(
        "[build]\nstaging_dir = '{}'\n\n[run]\njails_dir = '{}'\nextractor = 'native'\n\n{}",
        dir.join("staging").display(),
        dir.join("jails").display(),
        extra
    )
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("jailpack").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("jailpack 0.2.0"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("jailpack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_cli_build_missing_path() {
    let mut cmd = Command::cargo_bin("jailpack").unwrap();
    cmd.arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "required arguments were not provided",
        ));
}

#[test]
fn test_cli_build_creates_cage() {
    let dir = workspace();
    jailpack(dir.path(), &config_with(dir.path(), ""))
        .args(["build", "myapp", "-o", "out.cage.tar.gz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Building Cage from: myapp"))
        .stdout(predicate::str::contains("Cage created: out.cage.tar.gz"));

    let cage = dir.path().join("out.cage.tar.gz");
    let dest = tempfile::tempdir().unwrap();
    tar::Archive::new(GzDecoder::new(fs::File::open(&cage).unwrap()))
        .unpack(dest.path())
        .unwrap();

    assert_eq!(
        fs::read(dest.path().join("app/main.py")).unwrap(),
        b"print('hello')\n"
    );
    for d in [
        "app", "bin", "sbin", "lib", "libexec", "usr/bin", "usr/sbin", "etc", "tmp", "dev",
    ] {
        assert!(dest.path().join(d).is_dir(), "missing {d}");
    }
    let resolv = fs::read_to_string(dest.path().join("etc/resolv.conf")).unwrap();
    assert_eq!(resolv.lines().filter(|l| l.starts_with("nameserver ")).count(), 2);
    let mode = fs::metadata(dest.path().join("app-start.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert!(mode & 0o111 != 0);

    // Staging directory is gone
    assert_eq!(fs::read_dir(dir.path().join("staging")).unwrap().count(), 0);
}

#[test]
fn test_cli_build_default_output() {
    let dir = workspace();
    jailpack(dir.path(), &config_with(dir.path(), ""))
        .args(["build", "myapp"])
        .assert()
        .success();
    assert!(dir.path().join("app.cage.tar.gz").is_file());
}

#[test]
fn test_cli_build_rejects_traversal() {
    let dir = workspace();
    jailpack(dir.path(), &config_with(dir.path(), ""))
        .args(["build", "../myapp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("build error"))
        .stderr(predicate::str::contains("directory traversal"));
    assert!(!dir.path().join("app.cage.tar.gz").exists());
}

#[test]
fn test_cli_run_rejects_bad_name() {
    let dir = workspace();
    jailpack(dir.path(), &config_with(dir.path(), ""))
        .args(["run", "badcage.tar.gz", "--name", "bad;rm"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Extracting").not())
        .stderr(predicate::str::contains("invalid jail name"));
    assert!(!dir.path().join("jails").exists());
}

#[test]
fn test_cli_run_rejects_path_names() {
    let dir = workspace();
    let config = config_with(dir.path(), "[host]\njail = 'true'\n");

    jailpack(dir.path(), &config)
        .args(["build", "myapp", "-o", "out.cage.tar.gz"])
        .assert()
        .success();

    for name in ["/", "/etc"] {
        jailpack(dir.path(), &config)
            .args(["run", "out.cage.tar.gz", "--name", name])
            .assert()
            .failure()
            .stdout(predicate::str::contains("Extracting").not())
            .stderr(predicate::str::contains("not a single path component"));
    }
    assert!(!dir.path().join("jails").exists());
}

#[test]
fn test_cli_run_rejects_bad_ip() {
    let dir = workspace();
    jailpack(dir.path(), &config_with(dir.path(), ""))
        .args(["run", "app.cage.tar.gz", "--ip", "10.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid IP address"));
}

#[test]
fn test_cli_build_then_run() {
    let dir = workspace();
    // `true` stands in for jail(8)
    let config = config_with(dir.path(), "[host]\njail = 'true'\n");

    jailpack(dir.path(), &config)
        .args(["build", "myapp", "-o", "out.cage.tar.gz"])
        .assert()
        .success();

    jailpack(dir.path(), &config)
        .args([
            "run",
            "out.cage.tar.gz",
            "--name",
            "testjail",
            "--ip",
            "10.0.0.20",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracting Cage: out.cage.tar.gz"))
        .stdout(predicate::str::contains("Cage 'testjail' successfully started"));

    let root = dir.path().join("jails/testjail");
    assert!(root.join("app/main.py").is_file());
    assert!(root.join("app-start.sh").is_file());
}

#[test]
fn test_cli_run_jail_failure() {
    let dir = workspace();
    let config = config_with(dir.path(), "[host]\njail = 'false'\n");

    jailpack(dir.path(), &config)
        .args(["build", "myapp", "-o", "out.cage.tar.gz"])
        .assert()
        .success();

    jailpack(dir.path(), &config)
        .args(["run", "out.cage.tar.gz", "--name", "testjail"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("successfully started").not())
        .stderr(predicate::str::contains("jail start failed"));
}

#[test]
fn test_cli_run_missing_cage() {
    let dir = workspace();
    jailpack(dir.path(), &config_with(dir.path(), "[host]\njail = 'true'\n"))
        .args(["run", "missing.cage.tar.gz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("extract failed"));
}

#[test]
fn test_cli_list_relays_output() {
    let dir = workspace();
    // `echo` with no arguments prints an empty line
    jailpack(dir.path(), &config_with(dir.path(), "[host]\njls = 'echo'\n"))
        .arg("list")
        .assert()
        .success()
        .stdout("Running jails:\n\n");
}

#[test]
fn test_cli_list_error_does_not_fail() {
    let dir = workspace();
    jailpack(
        dir.path(),
        &config_with(dir.path(), "[host]\njls = 'jailpack-missing-jls'\n"),
    )
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("Running jails:"))
    .stdout(predicate::str::contains("Error listing jails"));
}

#[test]
fn test_cli_invalid_config() {
    let dir = workspace();
    jailpack(dir.path(), "[logging]\nlevel = 'loud'\n")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid log level"));
}
