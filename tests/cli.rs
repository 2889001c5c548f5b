use assert_cmd::Command;
use predicates::prelude::*;

fn grabber(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("transcript-grabber").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    grabber(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn invalid_video_id_exits_with_usage_error() {
    let home = tempfile::tempdir().unwrap();
    grabber(home.path())
        .args(["extract", "definitely-not-an-id"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("VIDEO_ID_OR_URL"));
}

#[test]
fn non_youtube_url_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    grabber(home.path())
        .args(["batch", "Iv-u8hwjHw4", "https://vimeo.com/76979871"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Not a YouTube URL"));
}

#[test]
fn config_show_prints_defaults() {
    let home = tempfile::tempdir().unwrap();
    grabber(home.path())
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Browser: chromium"))
        .stdout(predicate::str::contains("Batch Concurrency: 2"));
}

#[test]
fn local_config_file_is_used() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join("transcript-grabber.yaml"),
        "browser:\n  engine: edge\nbatch:\n  max_concurrency: 5\n",
    )
    .unwrap();

    grabber(home.path())
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Browser: edge"))
        .stdout(predicate::str::contains("Batch Concurrency: 5"));
}

#[test]
fn invalid_local_config_fails() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join("transcript-grabber.yaml"),
        "batch:\n  max_concurrency: 0\n",
    )
    .unwrap();

    grabber(home.path())
        .args(["config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_concurrency"));
}
