use std::collections::BTreeMap;
use std::path::Path;

use garland_rig::{ChannelMap, NodeId};

use crate::cache::ShowCache;
use crate::choreo::midi::{self, NoteEvent, NoteEventKind};
use crate::error::{require_file, ShowError};
use crate::script::{Command, Script};

/// Compiles a decoded midi event stream into one script per node.
///
/// Every node in the rig gets a script, even nodes whose channels a song
/// never touches; those come out empty and play as an immediate no-op.
pub struct Choreographer<'a> {
    map: &'a ChannelMap,
    use_cache: bool,
}

/// Per-node accumulator. `pending` is the command currently being filled;
/// it is flushed the moment time moves past it with changes staged.
struct NodeTrack {
    pending: Command,
    commands: Vec<Command>,
}

impl NodeTrack {
    fn new() -> Self {
        NodeTrack {
            pending: Command::new(),
            commands: Vec::new(),
        }
    }

    fn advance(&mut self, delta: f64) {
        if self.pending.has_changes() {
            let finished = std::mem::replace(&mut self.pending, Command::after(delta));
            self.commands.push(finished);
        } else {
            // Nothing staged for this node, so the gap folds into the wait
            // already in progress.
            self.pending.increase_timeout(delta);
        }
    }

    fn finish(mut self) -> Script {
        // A trailing wait with no changes drives nothing; drop it.
        if self.pending.has_changes() {
            self.commands.push(self.pending);
        }
        Script::from_commands(self.commands)
    }
}

impl<'a> Choreographer<'a> {
    pub fn new(map: &'a ChannelMap) -> Self {
        Choreographer {
            map,
            use_cache: true,
        }
    }

    /// Ignore cached scripts and rebuild from the midi file. The rebuild
    /// still rewrites the cache.
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Compile an event stream into per-node scripts.
    ///
    /// Fails on the first note with no configured pitch name or channel
    /// mapping; a partial show is worse than no show.
    pub fn build(
        &self,
        events: impl IntoIterator<Item = NoteEvent>,
    ) -> Result<BTreeMap<NodeId, Script>, ShowError> {
        let mut tracks: BTreeMap<NodeId, NodeTrack> = self
            .map
            .node_ids()
            .iter()
            .map(|id| (id.clone(), NodeTrack::new()))
            .collect();

        for event in events {
            if event.delta > 0.0 {
                for track in tracks.values_mut() {
                    track.advance(event.delta);
                }
            }

            let (note, on) = match event.kind {
                NoteEventKind::NoteOn(note) => (note, true),
                NoteEventKind::NoteOff(note) => (note, false),
                NoteEventKind::Other => continue,
            };

            let pitch = self.map.pitch_for_note(note)?;
            for channel in self.map.channels_for_pitch(pitch)? {
                let node = self.map.node_for_channel(channel)?;
                log::debug!(
                    "[{}] {} -> {}",
                    node,
                    channel,
                    if on { "on" } else { "off" }
                );
                if let Some(track) = tracks.get_mut(node) {
                    track.pending.set_channel(channel.clone(), on);
                }
            }
        }

        Ok(tracks
            .into_iter()
            .map(|(node, track)| (node, track.finish()))
            .collect())
    }

    /// Compile a song through the cache shell.
    ///
    /// When caching is on and every node's script is already on disk, the
    /// whole set loads from cache and the midi file is never opened. A
    /// partial cache rebuilds everything and rewrites every file, so the
    /// cache is always complete or untouched.
    pub fn build_song(
        &self,
        song: &str,
        midi_path: &Path,
        cache: &ShowCache,
    ) -> Result<BTreeMap<NodeId, Script>, ShowError> {
        let nodes = self.map.node_ids();

        if self.use_cache && nodes.iter().all(|node| cache.contains(song, node)) {
            log::info!("Loading {:?} scripts from cache", song);
            let mut scripts = BTreeMap::new();
            for node in nodes {
                scripts.insert(node.clone(), cache.load(song, node)?);
            }
            return Ok(scripts);
        }

        require_file(midi_path)?;
        log::info!("Building scripts for {}", midi_path.display());
        let events = midi::read_note_events(midi_path)?;
        let scripts = self.build(events)?;

        for (node, script) in &scripts {
            let path = cache.store(song, node, script)?;
            log::info!(
                "Wrote {} commands for [{}] to {}",
                script.len(),
                node,
                path.display()
            );
        }

        Ok(scripts)
    }
}
