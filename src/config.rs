//! Runtime settings for the signaling server

use std::time::Duration;

pub const DEFAULT_SIGNALING_PORT: u16 = 4000;
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Origins the browser clients are served from during local development.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:3001"];

/// Who may post chat into a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatPolicy {
    /// Only current members of the room may broadcast to it.
    #[default]
    MembersOnly,
    /// Any connection may broadcast to any existing room.
    Open,
}

/// Which `Origin` headers may open a connection.
///
/// Requests without an `Origin` header are not browsers and are always let
/// through; `*` in the list admits every origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed = origins
            .into_iter()
            .map(Into::into)
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn any() -> Self {
        Self::new(["*"])
    }

    pub fn allows(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        let origin = origin.trim_end_matches('/');
        self.allowed
            .iter()
            .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin))
    }

    pub fn origins(&self) -> &[String] {
        &self.allowed
    }
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ORIGINS.iter().copied())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub allowed_origins: OriginPolicy,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub chat_policy: ChatPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_SIGNALING_PORT),
            allowed_origins: OriginPolicy::default(),
            ping_interval: DEFAULT_PING_INTERVAL,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            chat_policy: ChatPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_origins_are_local_dev_ports() {
        let policy = OriginPolicy::default();
        assert!(policy.allows(Some("http://localhost:3000")));
        assert!(policy.allows(Some("http://localhost:3001")));
        assert!(!policy.allows(Some("http://localhost:8080")));
        assert!(!policy.allows(Some("https://evil.example")));
    }

    #[test]
    fn missing_origin_is_allowed() {
        assert!(OriginPolicy::new(Vec::<String>::new()).allows(None));
    }

    #[test]
    fn wildcard_allows_everything() {
        let policy = OriginPolicy::any();
        assert!(policy.allows(Some("https://anything.example")));
    }

    #[test]
    fn origins_are_normalized() {
        let policy = OriginPolicy::new([" https://app.example/ ", ""]);
        assert_eq!(policy.origins(), &["https://app.example".to_string()]);
        assert!(policy.allows(Some("https://APP.example")));
        assert!(policy.allows(Some("https://app.example/")));
    }

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:4000");
        assert_eq!(config.chat_policy, ChatPolicy::MembersOnly);
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.pong_timeout, Duration::from_secs(10));
    }
}
