use std::process::{Command, Output};
use tempfile::TempDir;

fn docqa(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docqa"))
        .args(args)
        .current_dir(dir.path())
        .env_remove("DOCQA_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("SILICON_API_KEY")
        .output()
        .expect("Failed to run docqa")
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = docqa(&temp_dir, &["init"]);
    assert!(output.status.success());

    let config_path = temp_dir.path().join(".docqa/settings.toml");
    assert!(config_path.exists());
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[retrieval]"));
    assert!(content.contains("[embedding]"));

    // A second init refuses to overwrite without --force
    let again = docqa(&temp_dir, &["init"]);
    assert_eq!(again.status.code(), Some(2));
    assert!(docqa(&temp_dir, &["init", "--force"]).status.success());
}

#[test]
fn test_config_command_redacts_api_key() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join(".docqa");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("settings.toml"),
        r#"
version = 2
[remote]
api_key = "sk-very-secret"
[retrieval]
top_k = 9
"#,
    )
    .unwrap();

    let output = docqa(&temp_dir, &["config"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("top_k = 9"));
    assert!(stdout.contains("<redacted>"));
    assert!(!stdout.contains("sk-very-secret"));
}

#[test]
fn test_commands_before_ingest() {
    let temp_dir = TempDir::new().unwrap();
    assert!(docqa(&temp_dir, &["init"]).status.success());

    let ask = docqa(&temp_dir, &["ask", "What", "happens?"]);
    assert_eq!(ask.status.code(), Some(5), "NOT_READY exit code");

    let status = docqa(&temp_dir, &["status"]);
    assert!(status.status.success());
    let stdout = String::from_utf8(status.stdout).unwrap();
    assert!(stdout.contains("No document indexed"));
    assert!(stdout.contains("missing"));

    let ingest = docqa(&temp_dir, &["ingest", "absent.pdf", "--no-progress"]);
    assert_eq!(ingest.status.code(), Some(3), "IO_ERROR exit code");
}
