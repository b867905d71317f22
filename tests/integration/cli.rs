use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::{TempDir, tempdir};

fn scriptkeeper(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("scriptkeeper").unwrap();
    cmd.arg("--config-dir")
        .arg(config_dir)
        .arg("--no-progress")
        .env("NO_COLOR", "1")
        .env_remove("GITHUB_TOKEN")
        .env_remove("SCRIPTKEEPER_HOME")
        .env_remove("RUST_LOG");
    cmd
}

/// A registry with one item installed under `<temp>/scripts/tools`, with one
/// archived version on disk.
fn seeded() -> (TempDir, std::path::PathBuf) {
    let temp = tempdir().unwrap();
    let config = temp.path().join("config");
    let root = temp.path().join("scripts").join("tools");
    let slot = root.join("Older Versions").join("20240101-120000_abcdef12_from-github");

    std::fs::create_dir_all(&slot).unwrap();
    std::fs::write(root.join("main.lua"), "new").unwrap();
    std::fs::write(slot.join("main.lua"), "old").unwrap();
    std::fs::write(
        root.join("Older Versions").join("20240101-120000_abcdef12_from-github.commit"),
        "abcdef1234567890abcdef1234567890abcdef12",
    )
    .unwrap();

    let registry = serde_json::json!([{
        "name": "tools",
        "repo_url": "https://github.com/acme/tools",
        "folder_path": "",
        "local_path": root,
        "category": "script",
        "current_version_sha": "9876543210fedcba9876543210fedcba98765432",
        "update_status": "uptodate"
    }]);
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(config.join("managed_scripts.json"), registry.to_string()).unwrap();
    (temp, root)
}

#[test]
fn test_list_empty() {
    let temp = tempdir().unwrap();
    scriptkeeper(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No managed scripts"));

    scriptkeeper(temp.path())
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_config_set_and_get() {
    let temp = tempdir().unwrap();
    scriptkeeper(temp.path())
        .args(["config", "set", "update_method", "differential"])
        .assert()
        .success();

    scriptkeeper(temp.path())
        .args(["config", "get", "update-method"])
        .assert()
        .success()
        .stdout(predicate::str::diff("differential\n"));

    let saved = std::fs::read_to_string(temp.path().join("config.toml")).unwrap();
    assert!(saved.contains("update_method = \"differential\""));

    scriptkeeper(temp.path())
        .args(["config", "set", "update-method", "merge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("merge"));
}

#[test]
fn test_config_path_and_show() {
    let temp = tempdir().unwrap();
    scriptkeeper(temp.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(temp.path().to_string_lossy().as_ref()));

    scriptkeeper(temp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("entry-file").and(predicate::str::contains("main.lua")));
}

#[test]
fn test_add_rejects_invalid_url() {
    let temp = tempdir().unwrap();
    scriptkeeper(temp.path())
        .args(["add", "ftp://example.com/acme/tools"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid repository location"));
}

#[test]
fn test_unknown_item_is_reported() {
    let temp = tempdir().unwrap();
    scriptkeeper(temp.path())
        .args(["versions", "nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No managed script named 'nothing'"));
}

#[test]
fn test_update_with_no_items() {
    let temp = tempdir().unwrap();
    scriptkeeper(temp.path())
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to update"));
}

#[test]
fn test_versions_and_restore() {
    let (temp, root) = seeded();
    let config = temp.path().join("config");

    scriptkeeper(&config)
        .args(["versions", "tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("20240101-120000_abcdef12_from-github"));

    scriptkeeper(&config)
        .args(["restore", "tools", "20240101-120000_abcdef12_from-github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"));

    assert_eq!(std::fs::read_to_string(root.join("main.lua")).unwrap(), "old");
    let registry = std::fs::read_to_string(config.join("managed_scripts.json")).unwrap();
    assert!(registry.contains("abcdef1234567890abcdef1234567890abcdef12"));

    let slots: Vec<String> = std::fs::read_dir(root.join("Older Versions"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(slots.iter().any(|s| s.ends_with("_98765432_before-restore")));
}

#[cfg(unix)]
#[test]
fn test_failed_restore_is_recorded() {
    let (temp, root) = seeded();
    let config = temp.path().join("config");
    std::fs::create_dir_all(root.join("data")).unwrap();
    std::fs::write(root.join("data").join("keep.lua"), "k").unwrap();
    let slot = "20240202-120000_11111111_from-github";
    std::os::unix::fs::symlink(root.join("data"), root.join("Older Versions").join(slot)).unwrap();

    scriptkeeper(&config)
        .args(["restore", "tools", slot])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to restore version"));

    let registry = std::fs::read_to_string(config.join("managed_scripts.json")).unwrap();
    assert!(!registry.contains("9876543210fedcba"));
    assert!(registry.contains("\"update_status\": \"unknown\""));
}

#[test]
fn test_restore_unknown_slot_leaves_registry() {
    let (temp, root) = seeded();
    let config = temp.path().join("config");

    scriptkeeper(&config)
        .args(["restore", "tools", "20990101-000000_deadbeef_from-github"])
        .assert()
        .failure();

    assert_eq!(std::fs::read_to_string(root.join("main.lua")).unwrap(), "new");
    let registry = std::fs::read_to_string(config.join("managed_scripts.json")).unwrap();
    assert!(registry.contains("9876543210fedcba9876543210fedcba98765432"));
}

#[test]
fn test_remove_keep_files() {
    let (temp, root) = seeded();
    let config = temp.path().join("config");

    scriptkeeper(&config).args(["remove", "tools", "--keep-files"]).assert().success();

    assert!(root.join("main.lua").exists());
    scriptkeeper(&config)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_remove_deletes_files() {
    let (temp, root) = seeded();
    let config = temp.path().join("config");

    scriptkeeper(&config).args(["remove", "tools"]).assert().success();
    assert!(!root.exists());
}
