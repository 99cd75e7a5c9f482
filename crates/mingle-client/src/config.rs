use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

/// Refresh periods of the polling views.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub chat_interval: Duration,
    pub dm_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            chat_interval: Duration::from_secs(2),
            dm_interval: Duration::from_secs(3),
        }
    }
}
