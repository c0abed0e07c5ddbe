use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Config pointing every path into `dir` and every tool at a missing binary,
/// so runs are deterministic without any tool installed.
fn isolated_config(dir: &Path) -> String {
    format!(
        r#"
[state]
dir = "{dir}/state"

[artifacts]
dir = "{dir}/downloads"

[auth]
cookies_file = "{dir}/cookies.txt"

[extractor]
program = "/nonexistent/yt-dlp"

[raw_fetcher]
program = "/nonexistent/aria2c"

[browser]
enabled = false

[sink]
program = "/nonexistent/rclone"
"#,
        dir = dir.display()
    )
}

fn run_binary(config_path: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_linkrelay"))
        .env("LINKRELAY_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .env_remove("RCLONE_REMOTE")
        .output()
        .expect("Failed to spawn linkrelay")
}

fn write_config(temp: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = temp.path().join("linkrelay.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_empty_backlog_exits_zero() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, &isolated_config(temp.path()));

    let output = run_binary(&config);

    assert!(output.status.success());
    assert!(temp.path().join("downloads").is_dir());
    assert!(!temp.path().join("state/queue.processing.txt").exists());
}

#[test]
fn test_failed_link_is_requeued_and_run_succeeds() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, &isolated_config(temp.path()));
    fs::create_dir_all(temp.path().join("state")).unwrap();
    fs::write(
        temp.path().join("state/queue.txt"),
        "https://example.com/file.mp4\n",
    )
    .unwrap();

    let output = run_binary(&config);

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(temp.path().join("state/queue.txt")).unwrap(),
        "https://example.com/file.mp4\t1\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("state/failed.txt")).unwrap(),
        "https://example.com/file.mp4\n"
    );
    assert!(!temp.path().join("state/completed.txt").exists());
    assert!(!temp.path().join("state/queue.processing.txt").exists());
}

#[test]
fn test_invalid_config_exits_one() {
    let temp = TempDir::new().unwrap();
    let mut contents = isolated_config(temp.path());
    contents.push_str("\n[retry]\nmax_attempts = \"many\"\n");
    let config = write_config(&temp, &contents);

    let output = run_binary(&config);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_missing_explicit_config_exits_one() {
    let temp = TempDir::new().unwrap();
    let output = run_binary(&temp.path().join("absent.toml"));
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_default_artifact_dir_lives_under_state_dir() {
    let temp = TempDir::new().unwrap();
    let contents = format!(
        r#"
[state]
dir = "{dir}/state"

[extractor]
program = "/nonexistent/yt-dlp"

[raw_fetcher]
program = "/nonexistent/aria2c"

[browser]
enabled = false

[sink]
program = "/nonexistent/rclone"
"#,
        dir = temp.path().display()
    );
    let config = write_config(&temp, &contents);
    let workdir = temp.path().join("elsewhere");
    fs::create_dir(&workdir).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_linkrelay"))
        .current_dir(&workdir)
        .env("LINKRELAY_CONFIG", &config)
        .env("RUST_LOG", "error")
        .env_remove("RCLONE_REMOTE")
        .output()
        .expect("Failed to spawn linkrelay");

    assert!(output.status.success());
    assert!(temp.path().join("state/downloads").is_dir());
    assert!(!workdir.join("downloads").exists());
}
