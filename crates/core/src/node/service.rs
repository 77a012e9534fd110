use std::time::Instant;

use garland_rig::NodeId;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::ShowError;
use crate::hardware::RelaySink;
use crate::playback::play_script;
use crate::script::Script;

/// What a node holds after a load.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadSummary {
    pub commands: usize,
    pub predicted_runtime: f64,
}

/// What a node reports once playback completes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaySummary {
    pub total_runtime: f64,
}

/// One node's receiving side: a single script slot and the relay sink
/// that plays it.
///
/// The slot holds at most one script and is replaced whole on every load.
/// A load or a second play while playback is in flight is refused rather
/// than queued; the dispatcher owns sequencing, the node just refuses to
/// corrupt a running show.
pub struct NodeService {
    node_id: NodeId,
    script: Mutex<Option<Script>>,
    playback: AsyncMutex<Box<dyn RelaySink>>,
}

impl NodeService {
    pub fn new(node_id: NodeId, sink: Box<dyn RelaySink>) -> Self {
        NodeService {
            node_id,
            script: Mutex::new(None),
            playback: AsyncMutex::new(sink),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Replace the held script in full.
    pub fn load(&self, script: Script) -> Result<LoadSummary, ShowError> {
        // Holding the playback lock for the swap both detects an in-flight
        // show and keeps a play from starting mid-load.
        let _playing = self
            .playback
            .try_lock()
            .map_err(|_| ShowError::NodeBusy(self.node_id.clone()))?;

        let summary = LoadSummary {
            commands: script.len(),
            predicted_runtime: script.total_timeout(),
        };
        *self.script.lock() = Some(script);

        log::info!(
            "[{}] loaded {} commands, {:.2}s predicted",
            self.node_id,
            summary.commands,
            summary.predicted_runtime
        );
        Ok(summary)
    }

    /// Play the held script to completion. An empty slot plays as an
    /// immediate no-op, not an error; a node a song never uses still takes
    /// part in the show.
    pub async fn play(&self) -> Result<PlaySummary, ShowError> {
        let mut sink = self
            .playback
            .try_lock()
            .map_err(|_| ShowError::NodeBusy(self.node_id.clone()))?;

        let script = self.script.lock().clone().unwrap_or_default();
        log::info!("[{}] playing {} commands", self.node_id, script.len());

        let started = Instant::now();
        match play_script(&script, sink.as_mut()).await {
            Ok(time_lost) => {
                let summary = PlaySummary {
                    total_runtime: started.elapsed().as_secs_f64(),
                };
                log::info!(
                    "[{}] done in {:.2}s, {:.3}s lost to overhead",
                    self.node_id,
                    summary.total_runtime,
                    time_lost
                );
                Ok(summary)
            }
            Err(err) => {
                // Never leave relays latched mid-show: force everything off
                // once, then surface the original failure.
                log::error!("[{}] playback failed: {}", self.node_id, err);
                if let Err(off_err) = sink.set_all(false) {
                    log::error!("[{}] emergency all-off failed: {}", self.node_id, off_err);
                }
                Err(err)
            }
        }
    }

    /// Drive every channel this node owns to one state.
    pub async fn set_all_channels(&self, on: bool) -> Result<(), ShowError> {
        let mut sink = self.playback.lock().await;
        sink.set_all(on)
    }
}
