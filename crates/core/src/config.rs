use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use garland_rig::{ChannelId, ChannelMap, Node, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::{require_file, ShowError};

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

/// Everything a run needs to know about the rig and its songs. Loaded once
/// from a JSON file and passed around by reference; nothing mutates it
/// after startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShowSettings {
    /// Midi note number to pitch name, e.g. "60" -> "C3". Shared by every
    /// song so the channel mappings read as music, not numbers.
    pub notes: BTreeMap<u8, String>,
    pub nodes: BTreeMap<NodeId, Node>,
    pub songs: BTreeMap<String, SongSettings>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Upper bound on how long a node may take to answer a trigger.
    /// Unset means wait forever, which is right for a wired rig.
    #[serde(default)]
    pub trigger_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongSettings {
    pub midi: PathBuf,
    pub audio: PathBuf,
    /// Pitch name to the ordered channels it drives.
    pub pitch_channels: BTreeMap<String, Vec<ChannelId>>,
}

impl ShowSettings {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<ShowSettings, ShowError> {
        require_file(path)?;

        let content = fs::read_to_string(path)?;
        let settings: ShowSettings = serde_json::from_str(&content)
            .map_err(|e| ShowError::Config(format!("{}: {}", path.display(), e)))?;

        if let Err(problems) = settings.validate() {
            for problem in &problems {
                log::error!("config: {}", problem);
            }
            return Err(ShowError::Config(problems.join("; ")));
        }

        log::info!(
            "Loaded {} nodes and {} songs from {}",
            settings.nodes.len(),
            settings.songs.len(),
            path.display()
        );
        Ok(settings)
    }

    /// Structural checks, collected rather than failed one at a time so a
    /// config session fixes everything in one pass.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.nodes.is_empty() {
            problems.push("no nodes configured".to_string());
        }

        // Channel ownership must be disjoint across nodes.
        let mut owners: BTreeMap<&ChannelId, &NodeId> = BTreeMap::new();
        for (node_id, node) in &self.nodes {
            for channel_id in node.channels.keys() {
                if let Some(previous) = owners.insert(channel_id, node_id) {
                    problems.push(format!(
                        "channel {} is owned by both {} and {}",
                        channel_id, previous, node_id
                    ));
                }
            }
        }

        for (song, settings) in &self.songs {
            for (pitch, channels) in &settings.pitch_channels {
                if channels.is_empty() {
                    problems.push(format!(
                        "song {:?} maps pitch {} to no channels",
                        song, pitch
                    ));
                }
                for channel in channels {
                    if !owners.contains_key(channel) {
                        problems.push(format!(
                            "song {:?} maps pitch {} to unwired channel {}",
                            song, pitch, channel
                        ));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    pub fn song(&self, name: &str) -> Result<&SongSettings, ShowError> {
        self.songs
            .get(name)
            .ok_or_else(|| ShowError::UnknownSong(name.to_string()))
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node, ShowError> {
        self.nodes
            .get(id)
            .ok_or_else(|| ShowError::Config(format!("node {} is not configured", id)))
    }

    /// The static lookup tables for compiling one song.
    pub fn channel_map(&self, song: &str) -> Result<ChannelMap, ShowError> {
        let settings = self.song(song)?;
        Ok(ChannelMap::new(
            self.notes.clone(),
            settings.pitch_channels.clone(),
            &self.nodes,
        ))
    }

    pub fn trigger_timeout(&self) -> Option<Duration> {
        self.trigger_timeout_secs.map(Duration::from_secs)
    }
}
