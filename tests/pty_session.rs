// Drives the compiled binary through a PTY to exercise the real event loop
// and crossterm input handling.
//
// Notes:
// - Requires a TTY; uses expectrl which allocates a pseudo terminal.
// - Marked Unix-only and ignored by default to avoid CI/platform issues.
// - Run manually via: `cargo test --test pty_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use assert_cmd::Command;
use expectrl::{spawn, Eof};
use tempfile::tempdir;

#[test]
#[ignore]
fn practice_session_starts_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    let bin = assert_cmd::cargo::cargo_bin("typesprint");
    let cmd = format!(
        "env HOME={} {} --mode practice --difficulty easy",
        home.path().display(),
        bin.display()
    );

    let mut p = spawn(cmd)?;

    // let the passage arrive from the bundled table
    std::thread::sleep(Duration::from_millis(300));
    p.send("Th")?;
    std::thread::sleep(Duration::from_millis(200));

    p.send("\x1b")?; // ESC
    p.expect(Eof)?;
    Ok(())
}

#[test]
fn export_history_without_tty() {
    let home = tempdir().unwrap();
    let out = home.path().join("history.csv");

    Command::cargo_bin("typesprint")
        .unwrap()
        .env("HOME", home.path())
        .arg("--export-history")
        .arg(&out)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&out).unwrap();
    assert!(contents.starts_with("date,wpm,accuracy"));
}

#[test]
fn zero_duration_is_rejected() {
    let home = tempdir().unwrap();
    Command::cargo_bin("typesprint")
        .unwrap()
        .env("HOME", home.path())
        .args(["--duration", "0"])
        .assert()
        .failure();
}
