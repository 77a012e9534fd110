use std::collections::BTreeMap;

use garland_rig::ChannelId;
use serde::{Deserialize, Serialize};

/// One timed batch of channel changes.
///
/// `timeout` is how long to wait, in seconds, after the previous command in
/// the same script before applying `changes`. All changes in one command
/// land together, so simultaneous midi notes switch in the same instant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub timeout: f64,
    pub changes: BTreeMap<ChannelId, bool>,
}

impl Command {
    pub fn new() -> Self {
        Command::default()
    }

    /// An empty command that fires `timeout` seconds after its predecessor.
    pub fn after(timeout: f64) -> Self {
        Command {
            timeout,
            changes: BTreeMap::new(),
        }
    }

    /// Stage a channel state. Setting the same channel twice in one command
    /// is suspicious enough to warn about, but the show goes on: the last
    /// write wins.
    pub fn set_channel(&mut self, channel: ChannelId, on: bool) {
        if let Some(previous) = self.changes.get(&channel) {
            log::warn!(
                "channel {} set twice in one command ({} -> {})",
                channel,
                previous,
                on
            );
        }
        self.changes.insert(channel, on);
    }

    pub fn increase_timeout(&mut self, delta: f64) {
        self.timeout += delta;
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}
