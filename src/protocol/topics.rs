//! Topic derivation for the bridge's two MQTT channels

/// Default topic namespace root when none is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "airlink";

/// The two topics the bridge uses, derived once from the configured prefix
/// and fixed for the bridge's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTopics {
    /// `<prefix>/message/send` - the bridge subscribes here; publishes on
    /// this topic are relayed to the modem.
    pub send: String,
    /// `<prefix>/message/receive` - the bridge publishes inbound modem
    /// messages here.
    pub receive: String,
}

impl BridgeTopics {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            send: format!("{prefix}/message/send"),
            receive: format!("{prefix}/message/receive"),
        }
    }
}

impl Default for BridgeTopics {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}
