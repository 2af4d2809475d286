#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::predicate;

/// Binds and releases a port so nothing is listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Fake box that accepts one connection, runs the handshake and returns the
/// 16 key bytes it received.
fn spawn_fake_box() -> (u16, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let mut buf = [0_u8; 64];
        sock.write_all(b"SKY 000.001\n").unwrap();
        let _ = sock.read(&mut buf).unwrap();
        sock.write_all(&[1]).unwrap();
        let _ = sock.read(&mut buf).unwrap();
        sock.write_all(&[0_u8; 24]).unwrap();
        let mut keys = vec![0_u8; 16];
        sock.read_exact(&mut keys).unwrap();
        keys
    });
    (port, handle)
}

#[test]
fn test_help_lists_subcommands() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("keys"))
        .stdout(predicate::str::contains("--host"));
}

#[test]
fn test_keys_lists_aliases() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir")
        .arg(dir.path())
        .arg("keys")
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stdout(predicate::str::contains("channelup"))
        .stdout(predicate::str::contains("dismiss"));
}

#[test]
fn test_unknown_keyword_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir")
        .arg(dir.path())
        .arg("warpdrive")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'warpdrive' is not a command"));
}

#[test]
fn test_extra_arguments_fail() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["play", "pause"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected arguments"));
}

#[test]
fn test_unreachable_box_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let port = closed_port();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["--host", "127.0.0.1", "--remote-port", &port.to_string(), "play"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to send 'play'"));
}

#[test]
fn test_press_reaches_fake_box() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let (port, fake) = spawn_fake_box();

    // Act
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["--host", "127.0.0.1", "--remote-port", &port.to_string(), "PLAY"])
        .assert()
        .success();
    let keys = fake.join().unwrap();

    // Assert
    assert_eq!(keys, vec![4, 1, 0, 0, 0, 0, 0xE4, 0x00, 4, 0, 0, 0, 0, 0, 0xE4, 0x00]);
}

#[test]
fn test_host_from_config_file() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let (port, fake) = spawn_fake_box();
    std::fs::write(
        dir.path().join("config.toml"),
        format!("[box]\nhost = \"127.0.0.1\"\nremote_port = {port}\n"),
    )
    .unwrap();

    // Act
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir").arg(dir.path()).arg("select").assert().success();
    let keys = fake.join().unwrap();

    // Assert
    assert_eq!(keys.get(6..8).unwrap(), [0xE0, 0x01]);
}

#[test]
fn test_init_writes_config_once() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["--host", "10.0.0.7", "--legacy", "init", "--refresh", "6h"])
        .assert()
        .success();
    let mut again = cargo_bin_cmd!("skyq");
    let second = again.arg("--dir").arg(dir.path()).arg("init").assert();

    // Assert
    let written = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(written.contains("host = \"10.0.0.7\""));
    assert!(written.contains("remote_port = 5900"));
    assert!(written.contains("refresh = \"6h\""));
    second
        .failure()
        .stderr(predicate::str::contains("pass --force to overwrite"));
}

#[test]
fn test_init_rejects_bad_refresh() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["init", "--refresh", "10000000000000000000s"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid refresh schedule"));
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_completions_bash() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("skyq");
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skyq"));
}
