//! Port allocation

/// Base of the allocated port range
pub const DEFAULT_BASE_PORT: u16 = 3000;

/// Deterministic port for an environment: `base + (sum of char codes % 1000)`.
///
/// Does not probe for availability. Two environments may collide; the
/// displace step frees the previous occupant of the same environment.
pub fn allocate_port(base_port: u16, environment: &str) -> u16 {
    let hash: u32 = environment.chars().map(|c| c as u32).sum();
    base_port.saturating_add((hash % 1000) as u16)
}
