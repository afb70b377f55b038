//! Safety checks for command text and paths derived from repositories and requests
//!
//! Every check fails closed: a rejection is fatal to the deployment that
//! triggered it.

use std::path::{Component, Path, PathBuf};

use crate::errors::DaemonError;
use crate::models::deployment::{Deployment, SHORT_SHA_LEN};

/// Longest command accepted, in characters
pub const MAX_COMMAND_LEN: usize = 1000;

/// Longest DNS label
pub const MAX_LABEL_LEN: usize = 63;

/// Shell metacharacters and sequences that are never allowed in a command.
/// Multi-character sequences come first so the reported pattern is the most specific.
const FORBIDDEN_PATTERNS: &[&str] = &[
    "&&", "||", ">>", "<<", "$(", "${", ";", "|", "&", "`", "$", ")", "}", ">", "<", "\\",
];

/// Reject empty, overlong, or shell-metacharacter-bearing command text
pub fn validate_command(command: &str) -> Result<(), DaemonError> {
    if command.trim().is_empty() {
        return Err(DaemonError::ValidationRejected(
            "empty command not allowed".to_string(),
        ));
    }

    if command.chars().count() > MAX_COMMAND_LEN {
        return Err(DaemonError::ValidationRejected(format!(
            "command too long, maximum {} characters",
            MAX_COMMAND_LEN
        )));
    }

    if let Some(pattern) = FORBIDDEN_PATTERNS.iter().find(|p| command.contains(*p)) {
        return Err(DaemonError::ValidationRejected(format!(
            "command contains unsupported characters: {}",
            pattern
        )));
    }

    Ok(())
}

/// Reject paths with `..` segments or that land outside `workspace_root`.
///
/// Relative paths are resolved against the root, and both sides are
/// normalised lexically, so the containment check covers relative and
/// absolute input alike.
pub fn validate_path(path: &Path, workspace_root: &Path) -> Result<(), DaemonError> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(DaemonError::ValidationRejected(format!(
            "path contains a parent-directory segment: {}",
            path.display()
        )));
    }

    let root = normalize(&absolute(workspace_root)?);
    let resolved = if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    };

    if !resolved.starts_with(&root) {
        return Err(DaemonError::ValidationRejected(format!(
            "path outside allowed directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Check the externally supplied coordinates of a deployment before it is queued
pub fn validate_request(deployment: &Deployment) -> Result<(), DaemonError> {
    validate_name("owner", &deployment.owner)?;
    validate_name("repo", &deployment.repo)?;

    validate_environment(&deployment.environment)?;

    let sha = &deployment.sha;
    if sha.len() < SHORT_SHA_LEN || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DaemonError::ValidationRejected(format!(
            "commit sha must be at least {} hex characters: {:?}",
            SHORT_SHA_LEN, sha
        )));
    }

    if deployment.clone_url.starts_with('-') {
        return Err(DaemonError::ValidationRejected(format!(
            "invalid clone url: {}",
            deployment.clone_url
        )));
    }

    Ok(())
}

/// Environments become a subdomain of the public URL and a checkout directory,
/// so they must be a single DNS label
pub fn validate_environment(environment: &str) -> Result<(), DaemonError> {
    let valid = (1..=MAX_LABEL_LEN).contains(&environment.len())
        && !environment.starts_with('-')
        && !environment.ends_with('-')
        && environment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !valid {
        return Err(DaemonError::ValidationRejected(format!(
            "environment must be a lowercase DNS label of at most {} characters: {:?}",
            MAX_LABEL_LEN, environment
        )));
    }
    Ok(())
}

/// Owner and repository names become path segments and process names
fn validate_name(field: &str, value: &str) -> Result<(), DaemonError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if !valid {
        return Err(DaemonError::ValidationRejected(format!(
            "invalid {}: {:?}",
            field, value
        )));
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf, DaemonError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Drop `.` components and fold `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
