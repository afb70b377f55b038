//! Instance naming and public URLs

/// Longest sanitised part of an instance name
const MAX_PART_LEN: usize = 50;

/// Supervisor/compose name shared by every deployment of an owner/repo/environment.
///
/// Lowercase, since it also tags container images.
pub fn instance_name(owner: &str, repo: &str, environment: &str) -> String {
    format!(
        "{}-{}-{}",
        sanitize(owner),
        sanitize(repo),
        sanitize(environment)
    )
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .take(MAX_PART_LEN)
        .collect();
    cleaned.trim_matches('-').to_string()
}

/// Public URL of an environment; `production` is served under the repository name
pub fn public_url(environment: &str, repo: &str, domain: &str) -> String {
    let subdomain = if environment == "production" {
        repo
    } else {
        environment
    };
    format!("https://{}.{}", subdomain, domain)
}
