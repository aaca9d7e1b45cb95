use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = Command::new(env!("CARGO_BIN_EXE_classview"))
        .arg("init")
        .current_dir(temp_path)
        .output()
        .expect("Failed to run init command");

    assert!(output.status.success());

    // Check that config file was created
    let config_path = temp_path.join(".classview/settings.toml");
    assert!(config_path.exists());

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[batching]"));
    assert!(content.contains("[browser]"));

    // A second init without --force refuses to overwrite
    let output = Command::new(env!("CARGO_BIN_EXE_classview"))
        .arg("init")
        .current_dir(temp_path)
        .output()
        .expect("Failed to run init command");
    assert!(!output.status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_dir = temp_path.join(".classview");
    std::fs::create_dir_all(&config_dir).unwrap();

    let config_content = r#"
version = 2
[batching]
max_batch_size = 7
"#;
    std::fs::write(config_dir.join("settings.toml"), config_content).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_classview"))
        .arg("config")
        .current_dir(temp_path)
        .env("CV_BROWSER__SHOW_LIBRARIES", "false")
        .output()
        .expect("Failed to run config command");

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("max_batch_size = 7"));
    assert!(stdout.contains("show_libraries = false"));
}

#[test]
fn test_demo_prints_tree() {
    let temp_dir = TempDir::new().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_classview"))
        .args(["demo", "--json"])
        .current_dir(temp_dir.path())
        .env("CV_DEMO_DELAY_MS", "10")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run demo command");

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    for text in [
        "geometry",
        "Shape",
        "area() : double",
        "Red",
        "Point",
        "x : int",
        "main() : int",
        "Project libraries",
        "stdlib",
        "string",
    ] {
        assert!(
            stdout.contains(&format!("\"text\": \"{text}\"")),
            "missing {text} in demo output:\n{stdout}"
        );
    }
    // Added and removed within the same burst
    assert!(!stdout.contains("scratch"));
}
