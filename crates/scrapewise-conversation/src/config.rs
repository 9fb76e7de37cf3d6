use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Inactivity after which a session is evicted
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Oldest turns beyond this are dropped from the history
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_ttl_minutes() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_turns() -> usize {
    50
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_turns: default_max_turns(),
        }
    }
}

impl ConversationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes.min(i64::MAX as u64) as i64)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
