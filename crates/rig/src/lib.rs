use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use channel_map::{ChannelMap, RigError};

mod channel_map;

/// Identifier for one relay channel. Channels are addressed by short string
/// ids ("1", "2", ...) so they can double as JSON map keys in scripts and
/// cache files.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        ChannelId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a controller node ("master", "porch", ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical wiring of one relay channel.
///
/// `active_low` relays energize when their pin is driven low; the inversion
/// is applied at write time and never appears in script data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub pin: u8,
    #[serde(default)]
    pub active_low: bool,
}

/// A playback endpoint owning a disjoint set of channels.
///
/// The node keyed "master" in the configuration is the one the dispatcher
/// runs on; it plays directly without network calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub host: String,
    pub port: u16,
    pub channels: BTreeMap<ChannelId, Channel>,
}

impl Node {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &ChannelId> {
        self.channels.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_serializes_as_bare_string() {
        let id = ChannelId::new("3");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"3\"");

        let back: ChannelId = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_node_address() {
        let node = Node {
            host: "10.0.0.12".to_string(),
            port: 4444,
            channels: BTreeMap::new(),
        };
        assert_eq!(node.address(), "10.0.0.12:4444");
    }

    #[test]
    fn test_channel_active_low_defaults_off() {
        let channel: Channel = serde_json::from_str("{\"pin\": 7}").unwrap();
        assert_eq!(channel.pin, 7);
        assert!(!channel.active_low);
    }
}
