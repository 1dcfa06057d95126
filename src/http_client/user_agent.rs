//! User agent handling for requests to the analysis service.

pub const USER_AGENT: &str = concat!("buzzscan/", env!("CARGO_PKG_VERSION"));

/// Resolve user agent from config value.
/// - None or blank => default buzzscan user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_agent_default() {
        assert!(resolve_user_agent(None).starts_with("buzzscan/"));
        assert!(resolve_user_agent(Some("  ")).starts_with("buzzscan/"));
    }

    #[test]
    fn test_resolve_user_agent_custom() {
        assert_eq!(resolve_user_agent(Some("MyBot/1.0")), "MyBot/1.0");
        assert_eq!(
            resolve_user_agent(Some("impersonate")),
            "impersonate",
            "no browser rotation for the analysis service"
        );
    }
}
