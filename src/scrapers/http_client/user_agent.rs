//! User agent handling for board requests.

/// Descriptive default so board operators can reach whoever runs the harvest.
pub const USER_AGENT: &str = concat!(
    "CouncilHarvest/",
    env!("CARGO_PKG_VERSION"),
    " (public records archiving; contact: harvest-ops@councilharvest.org)"
);

/// Resolve the user agent from an override (`HARVEST_USER_AGENT` or settings).
/// Blank overrides fall back to the default.
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ => USER_AGENT.to_string(),
    }
}
