use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use futures::StreamExt;
use libp2p::{
    gossipsub, identify, kad, noise, ping, tcp, yamux,
    swarm::SwarmEvent,
    Multiaddr, PeerId, Swarm,
};
use libp2p_swarm::NetworkBehaviour;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::blacklist::PeerBlacklist;
use crate::config::OverlayConfig;
use crate::message::{OverlayMessage, Topic};

/// Combined libp2p network behaviour: gossipsub for the three message
/// planes, Kademlia for peer routing and content-addressed publish/resolve,
/// identify and ping for connection bookkeeping.
#[derive(NetworkBehaviour)]
pub struct AgoriaBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
}

/// Commands the application layer sends into the network task.
pub enum OverlayCommand {
    Publish {
        topic: Topic,
        message: OverlayMessage,
    },
    /// Publish a content-addressed record to the DHT (e.g. an agent card).
    PutRecord { key: String, value: Vec<u8> },
    /// Resolve a content-addressed record from the DHT. The reply carries
    /// the bytes plus the peer that served them, so the caller can
    /// blacklist a peer that returned content failing verification.
    Resolve {
        key: String,
        reply: oneshot::Sender<Option<(Vec<u8>, Option<PeerId>)>>,
    },
}

/// Application-facing handle returned from `OverlayNetwork::new()`.
pub struct OverlayHandle {
    pub command_tx: mpsc::Sender<OverlayCommand>,
    pub card_rx: mpsc::Receiver<OverlayMessage>,
    pub guild_rx: mpsc::Receiver<OverlayMessage>,
    pub channel_rx: mpsc::Receiver<OverlayMessage>,
    pub local_peer_id: PeerId,
    pub blacklist: std::sync::Arc<PeerBlacklist>,
}

/// Owns the libp2p Swarm. Pass to `tokio::spawn(network.run())`.
pub struct OverlayNetwork {
    swarm: Swarm<AgoriaBehaviour>,
    card_topic: gossipsub::IdentTopic,
    guild_topic: gossipsub::IdentTopic,
    channel_topic: gossipsub::IdentTopic,
    command_rx: mpsc::Receiver<OverlayCommand>,
    card_tx: mpsc::Sender<OverlayMessage>,
    guild_tx: mpsc::Sender<OverlayMessage>,
    channel_tx: mpsc::Sender<OverlayMessage>,
    pending_resolves: HashMap<kad::QueryId, oneshot::Sender<Option<(Vec<u8>, Option<PeerId>)>>>,
}

impl OverlayNetwork {
    pub fn new(
        config: &OverlayConfig,
    ) -> Result<(Self, OverlayHandle), Box<dyn std::error::Error + Send + Sync>> {
        let card_topic = gossipsub::IdentTopic::new(&config.card_topic);
        let guild_topic = gossipsub::IdentTopic::new(&config.guild_topic);
        let channel_topic = gossipsub::IdentTopic::new(&config.channel_topic);

        let mut swarm = libp2p::SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )?
            .with_behaviour(|key: &libp2p::identity::Keypair| {
                let message_id_fn = |msg: &gossipsub::Message| {
                    let mut s = DefaultHasher::new();
                    msg.data.hash(&mut s);
                    gossipsub::MessageId::from(s.finish().to_string())
                };

                let gossipsub_config = gossipsub::ConfigBuilder::default()
                    .heartbeat_interval(Duration::from_secs(1))
                    .validation_mode(gossipsub::ValidationMode::Strict)
                    .message_id_fn(message_id_fn)
                    .build()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let gossipsub = gossipsub::Behaviour::new(
                    gossipsub::MessageAuthenticity::Signed(key.clone()),
                    gossipsub_config,
                )
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let store = kad::store::MemoryStore::new(key.public().to_peer_id());
                let kademlia = kad::Behaviour::new(key.public().to_peer_id(), store);

                let identify = identify::Behaviour::new(identify::Config::new(
                    config.protocol_version.clone(),
                    key.public(),
                ));

                let ping = ping::Behaviour::default();

                Ok(AgoriaBehaviour { gossipsub, kademlia, identify, ping })
            })?
            .build();

        for topic in [&card_topic, &guild_topic, &channel_topic] {
            swarm.behaviour_mut().gossipsub.subscribe(topic)?;
        }

        let listen_addr: Multiaddr = config.listen_addr.parse()?;
        swarm.listen_on(listen_addr)?;

        for addr_str in &config.bootstrap_peers {
            if let Ok(addr) = addr_str.parse::<Multiaddr>() {
                if let Some(libp2p::multiaddr::Protocol::P2p(peer_id)) = addr.iter().last() {
                    swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
                    debug!(peer = %peer_id, "added bootstrap peer");
                }
            }
        }

        let local_peer_id = *swarm.local_peer_id();
        let (command_tx, command_rx) = mpsc::channel(256);
        let (card_tx, card_rx) = mpsc::channel(256);
        let (guild_tx, guild_rx) = mpsc::channel(256);
        let (channel_tx, channel_rx) = mpsc::channel(256);
        let blacklist = std::sync::Arc::new(PeerBlacklist::default());

        let network = OverlayNetwork {
            swarm,
            card_topic,
            guild_topic,
            channel_topic,
            command_rx,
            card_tx,
            guild_tx,
            channel_tx,
            pending_resolves: HashMap::new(),
        };
        let handle = OverlayHandle {
            command_tx,
            card_rx,
            guild_rx,
            channel_rx,
            local_peer_id,
            blacklist,
        };

        Ok((network, handle))
    }

    fn topic_for(&self, topic: Topic) -> &gossipsub::IdentTopic {
        match topic {
            Topic::Card => &self.card_topic,
            Topic::Guild => &self.guild_topic,
            Topic::Channel => &self.channel_topic,
        }
    }

    /// Drive the overlay event loop. Run in a dedicated tokio task.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => self.handle_command(cmd),
                event = self.swarm.select_next_some() => self.handle_event(event),
            }
        }
    }

    fn handle_command(&mut self, cmd: OverlayCommand) {
        match cmd {
            OverlayCommand::Publish { topic, message } => {
                let data = message.to_bytes();
                let topic = self.topic_for(topic).clone();
                if let Err(e) = self.swarm.behaviour_mut().gossipsub.publish(topic, data) {
                    warn!(error = %e, "gossipsub publish failed");
                }
            }
            OverlayCommand::PutRecord { key, value } => {
                let record = kad::Record::new(kad::RecordKey::new(&key), value);
                if let Err(e) = self
                    .swarm
                    .behaviour_mut()
                    .kademlia
                    .put_record(record, kad::Quorum::One)
                {
                    warn!(error = %e, key, "kademlia put_record failed");
                }
            }
            OverlayCommand::Resolve { key, reply } => {
                let query_id = self
                    .swarm
                    .behaviour_mut()
                    .kademlia
                    .get_record(kad::RecordKey::new(&key));
                self.pending_resolves.insert(query_id, reply);
            }
        }
    }

    fn handle_event(&mut self, event: SwarmEvent<AgoriaBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(addr = %address, "overlay listening on");
            }
            SwarmEvent::Behaviour(AgoriaBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                message,
                ..
            })) => {
                self.dispatch_gossip(message);
            }
            SwarmEvent::Behaviour(AgoriaBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                for addr in info.listen_addrs {
                    self.swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
                }
            }
            SwarmEvent::Behaviour(AgoriaBehaviourEvent::Kademlia(
                kad::Event::OutboundQueryProgressed { id, result, .. },
            )) => {
                self.handle_query_result(id, result);
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!(peer = %peer_id, "connection established");
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!(peer = %peer_id, "connection closed");
            }
            _ => {}
        }
    }

    fn dispatch_gossip(&mut self, message: gossipsub::Message) {
        let decoded = match OverlayMessage::from_bytes(&message.data) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "failed to decode gossip message");
                return;
            }
        };

        let tx = if message.topic == self.card_topic.hash() {
            &self.card_tx
        } else if message.topic == self.guild_topic.hash() {
            &self.guild_tx
        } else if message.topic == self.channel_topic.hash() {
            &self.channel_tx
        } else {
            return;
        };

        if tx.try_send(decoded).is_err() {
            warn!("inbound overlay channel full, dropping message");
        }
    }

    fn handle_query_result(&mut self, id: kad::QueryId, result: kad::QueryResult) {
        match result {
            kad::QueryResult::GetRecord(Ok(kad::GetRecordOk::FoundRecord(peer_record))) => {
                if let Some(reply) = self.pending_resolves.remove(&id) {
                    let _ = reply.send(Some((peer_record.record.value, peer_record.peer)));
                }
            }
            kad::QueryResult::GetRecord(Ok(kad::GetRecordOk::FinishedWithNoAdditionalRecord {
                ..
            })) => {
                if let Some(reply) = self.pending_resolves.remove(&id) {
                    let _ = reply.send(None);
                }
            }
            kad::QueryResult::GetRecord(Err(_)) => {
                if let Some(reply) = self.pending_resolves.remove(&id) {
                    let _ = reply.send(None);
                }
            }
            kad::QueryResult::PutRecord(Err(e)) => {
                warn!(error = ?e, "kademlia put_record query failed");
            }
            _ => {}
        }
    }
}
