use garland_rig::ChannelId;
use serde::{Deserialize, Serialize};

use crate::script::command::Command;

/// Ordered list of commands for one node, covering an entire song.
///
/// Serializes as a bare array of commands, which keeps cache files and wire
/// payloads the same flat shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    commands: Vec<Command>,
}

impl Script {
    pub fn new() -> Self {
        Script::default()
    }

    pub fn from_commands(commands: Vec<Command>) -> Self {
        Script { commands }
    }

    /// One command driving every given channel to a single state. Used for
    /// the end-of-show gesture and the lights subcommand.
    pub fn uniform(channels: impl IntoIterator<Item = ChannelId>, on: bool) -> Self {
        let mut command = Command::new();
        for channel in channels {
            command.set_channel(channel, on);
        }
        if command.has_changes() {
            Script::from_commands(vec![command])
        } else {
            Script::new()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Sum of command timeouts: the script's predicted runtime, which real
    /// playback matches to within accumulated scheduling overhead.
    pub fn total_timeout(&self) -> f64 {
        self.commands.iter().map(|c| c.timeout).sum()
    }
}
