use assert_cmd::Command;

#[test]
fn discover_reports_no_projects_in_an_empty_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("cortex")
        .unwrap()
        .args(["discover", "--root"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No projects found"));
}

#[test]
fn load_a_missing_workspace_file_fails_with_a_clear_error() {
    let tmp = tempfile::tempdir().unwrap();
    Command::cargo_bin("cortex")
        .unwrap()
        .current_dir(tmp.path())
        .args(["load", "does-not-exist.json"])
        .assert()
        .failure();
}

#[test]
fn discover_finds_a_cargo_project() {
    let tmp = tempfile::tempdir().unwrap();
    let project_dir = tmp.path().join("demo");
    std::fs::create_dir_all(&project_dir).unwrap();
    std::fs::write(project_dir.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();

    let output = Command::cargo_bin("cortex")
        .unwrap()
        .args(["discover", "--root"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("demo"));
}
