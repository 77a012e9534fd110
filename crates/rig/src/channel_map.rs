use std::collections::BTreeMap;

use thiserror::Error;

use crate::{ChannelId, Node, NodeId};

/// Lookup failures raised while resolving notes to channels.
#[derive(Debug, Error, PartialEq)]
pub enum RigError {
    #[error("no pitch name configured for midi note {0}")]
    UnknownNote(u8),

    #[error("no channel mapping configured for pitch {0:?}")]
    UnknownPitch(String),

    #[error("channel {0} is not owned by any node")]
    UnknownChannel(ChannelId),
}

/// Static view of the rig for one song: which channels a pitch drives, which
/// node owns each channel, and how midi note numbers spell as pitch names.
///
/// Built once at startup from the configuration and never mutated; all
/// methods are pure lookups.
pub struct ChannelMap {
    note_names: BTreeMap<u8, String>,
    pitch_channels: BTreeMap<String, Vec<ChannelId>>,
    channel_nodes: BTreeMap<ChannelId, NodeId>,
    node_ids: Vec<NodeId>,
}

impl ChannelMap {
    pub fn new(
        note_names: BTreeMap<u8, String>,
        pitch_channels: BTreeMap<String, Vec<ChannelId>>,
        nodes: &BTreeMap<NodeId, Node>,
    ) -> Self {
        let mut channel_nodes = BTreeMap::new();
        for (node_id, node) in nodes {
            for channel_id in node.channels.keys() {
                channel_nodes.insert(channel_id.clone(), node_id.clone());
            }
        }

        ChannelMap {
            note_names,
            pitch_channels,
            channel_nodes,
            node_ids: nodes.keys().cloned().collect(),
        }
    }

    /// Spell a midi note number as its configured pitch name.
    pub fn pitch_for_note(&self, note: u8) -> Result<&str, RigError> {
        self.note_names
            .get(&note)
            .map(String::as_str)
            .ok_or(RigError::UnknownNote(note))
    }

    /// The ordered set of channels a pitch drives.
    pub fn channels_for_pitch(&self, pitch: &str) -> Result<&[ChannelId], RigError> {
        self.pitch_channels
            .get(pitch)
            .map(Vec::as_slice)
            .ok_or_else(|| RigError::UnknownPitch(pitch.to_string()))
    }

    /// The node that owns a channel. Every channel belongs to exactly one
    /// node; the configuration validator enforces disjoint ownership.
    pub fn node_for_channel(&self, channel: &ChannelId) -> Result<&NodeId, RigError> {
        self.channel_nodes
            .get(channel)
            .ok_or_else(|| RigError::UnknownChannel(channel.clone()))
    }

    /// Every node in the rig, in configuration order, whether or not the
    /// current song uses any of its channels.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Channel;

    fn small_rig() -> ChannelMap {
        let mut notes = BTreeMap::new();
        notes.insert(60, "C3".to_string());
        notes.insert(64, "E3".to_string());

        let mut pitches = BTreeMap::new();
        pitches.insert("C3".to_string(), vec![ChannelId::new("1")]);
        pitches.insert(
            "E3".to_string(),
            vec![ChannelId::new("2"), ChannelId::new("3")],
        );

        let mut nodes = BTreeMap::new();
        let mut channels = BTreeMap::new();
        channels.insert(
            ChannelId::new("1"),
            Channel {
                pin: 0,
                active_low: false,
            },
        );
        channels.insert(
            ChannelId::new("2"),
            Channel {
                pin: 1,
                active_low: false,
            },
        );
        nodes.insert(
            NodeId::new("master"),
            Node {
                host: "127.0.0.1".to_string(),
                port: 4444,
                channels,
            },
        );

        let mut porch_channels = BTreeMap::new();
        porch_channels.insert(
            ChannelId::new("3"),
            Channel {
                pin: 0,
                active_low: true,
            },
        );
        nodes.insert(
            NodeId::new("porch"),
            Node {
                host: "10.0.0.20".to_string(),
                port: 4444,
                channels: porch_channels,
            },
        );

        ChannelMap::new(notes, pitches, &nodes)
    }

    #[test]
    fn test_note_to_pitch_to_channels() {
        let map = small_rig();
        let pitch = map.pitch_for_note(64).unwrap();
        assert_eq!(pitch, "E3");

        let channels = map.channels_for_pitch(pitch).unwrap();
        assert_eq!(channels, &[ChannelId::new("2"), ChannelId::new("3")]);
    }

    #[test]
    fn test_channel_ownership() {
        let map = small_rig();
        assert_eq!(
            map.node_for_channel(&ChannelId::new("2")).unwrap(),
            &NodeId::new("master")
        );
        assert_eq!(
            map.node_for_channel(&ChannelId::new("3")).unwrap(),
            &NodeId::new("porch")
        );
    }

    #[test]
    fn test_lookup_misses() {
        let map = small_rig();
        assert_eq!(map.pitch_for_note(61), Err(RigError::UnknownNote(61)));
        assert_eq!(
            map.channels_for_pitch("G9"),
            Err(RigError::UnknownPitch("G9".to_string()))
        );
        assert_eq!(
            map.node_for_channel(&ChannelId::new("99")),
            Err(RigError::UnknownChannel(ChannelId::new("99")))
        );
    }

    #[test]
    fn test_node_ids_include_unused_nodes() {
        let map = small_rig();
        assert_eq!(
            map.node_ids(),
            &[NodeId::new("master"), NodeId::new("porch")]
        );
    }
}
