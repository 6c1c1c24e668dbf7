/// Configuration for the Agoria overlay network.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Local listen address (e.g. "/ip4/0.0.0.0/tcp/7070").
    pub listen_addr: String,
    /// Bootstrap peer multiaddresses.
    pub bootstrap_peers: Vec<String>,
    /// Protocol version string advertised to peers.
    pub protocol_version: String,
    /// GossipSub topic for agent card announcements.
    pub card_topic: String,
    /// GossipSub topic for guild control-plane messages.
    pub guild_topic: String,
    /// GossipSub topic for payment-channel messages.
    pub channel_topic: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/7070".into(),
            bootstrap_peers: Vec::new(),
            protocol_version: "/agoria/1.0.0".into(),
            card_topic: "agoria-cards".into(),
            guild_topic: "agoria-guilds".into(),
            channel_topic: "agoria-channels".into(),
        }
    }
}
