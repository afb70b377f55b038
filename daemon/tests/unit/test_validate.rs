//! Command and path validation tests

use std::path::Path;

use dockyard::deploy::validate::{validate_command, validate_path, validate_request, MAX_COMMAND_LEN};
use dockyard::errors::DaemonError;
use dockyard::models::deployment::Deployment;

#[test]
fn test_detector_commands_are_accepted() {
    for command in [
        "npm install",
        "npm run build",
        "docker-compose up -d",
        "docker run -d -p 3000:3000 app",
        "uvicorn app:app --host 0.0.0.0 --port 8000",
        "node .output/server/index.mjs",
    ] {
        assert!(validate_command(command).is_ok(), "{} was rejected", command);
    }
}

#[test]
fn test_shell_metacharacters_are_rejected() {
    for command in [
        "npm install && rm -rf /",
        "npm install || true",
        "echo $(whoami)",
        "echo ${HOME}",
        "ls | sh",
        "echo hi > /etc/passwd",
        "cat < /etc/shadow",
        "run `id`",
        "sleep 1 &",
        "a\\b",
    ] {
        assert!(
            matches!(validate_command(command), Err(DaemonError::ValidationRejected(_))),
            "{} was accepted",
            command
        );
    }
}

#[test]
fn test_command_length_limit() {
    assert!(validate_command(&"x".repeat(MAX_COMMAND_LEN)).is_ok());
    assert!(validate_command(&"x".repeat(MAX_COMMAND_LEN + 1)).is_err());
}

#[test]
fn test_paths_stay_inside_workspace() {
    let root = Path::new("/srv/repos");

    assert!(validate_path(Path::new("/srv/repos/acme/site"), root).is_ok());
    assert!(validate_path(Path::new("acme/site"), root).is_ok());
    assert!(validate_path(Path::new("./acme/site"), root).is_ok());

    assert!(validate_path(Path::new("/srv/repos/../etc"), root).is_err());
    assert!(validate_path(Path::new("acme/../../etc"), root).is_err());
    assert!(validate_path(Path::new("/etc/passwd"), root).is_err());
    // sibling with a shared string prefix
    assert!(validate_path(Path::new("/srv/repos-evil/x"), root).is_err());
}

#[test]
fn test_request_validation() {
    let valid = Deployment::new("acme", "site", "refs/heads/main", "abcdef1234567890");
    assert!(validate_request(&valid).is_ok());

    let short_sha = Deployment::new("acme", "site", "refs/heads/main", "abc12");
    assert!(validate_request(&short_sha).is_err());

    let not_hex = Deployment::new("acme", "site", "refs/heads/main", "zzzzzzzzzz");
    assert!(validate_request(&not_hex).is_err());

    let traversal = Deployment::new("..", "site", "refs/heads/main", "abcdef1234567890");
    assert!(validate_request(&traversal).is_err());

    let slash = Deployment::new("acme/evil", "site", "refs/heads/main", "abcdef1234567890");
    assert!(validate_request(&slash).is_err());

    let option_url = valid.clone().with_clone_url("--upload-pack=evil");
    assert!(validate_request(&option_url).is_err());
}
