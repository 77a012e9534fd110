use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use garland_rig::{ChannelId, NodeId};
use tokio::task::JoinHandle;

use crate::audio::{player_command, AudioProcess};
use crate::cache::ShowCache;
use crate::error::{require_file, ShowError};
use crate::node::client::NodeTransport;
use crate::node::service::NodeService;
use crate::script::Script;

/// One node taking part in shows: how to reach it and which channels it
/// owns (for the end-of-show gesture).
pub struct ShowNode {
    pub transport: Arc<dyn NodeTransport>,
    pub channels: Vec<ChannelId>,
}

/// How one show went. Node failures are listed rather than raised: one
/// dark porch should not kill the rest of the display.
#[derive(Debug)]
pub struct ShowReport {
    pub song: String,
    pub node_runtimes: Vec<(NodeId, f64)>,
    pub node_failures: Vec<(NodeId, String)>,
}

impl ShowReport {
    pub fn is_clean(&self) -> bool {
        self.node_failures.is_empty()
    }
}

/// Runs a show end to end: push every node's cached script, trigger them
/// all alongside the audio player, join everything, close the show.
pub struct ShowDispatcher {
    cache: ShowCache,
    nodes: Vec<ShowNode>,
    local: Arc<NodeService>,
    trigger_timeout: Option<Duration>,
    audio_delay: Duration,
}

impl ShowDispatcher {
    pub fn new(cache: ShowCache, nodes: Vec<ShowNode>, local: Arc<NodeService>) -> Self {
        ShowDispatcher {
            cache,
            nodes,
            local,
            trigger_timeout: None,
            audio_delay: Duration::ZERO,
        }
    }

    /// Bound how long a trigger waits for a node to finish. Unset, a hung
    /// node stalls its branch of the join and the show waits with it.
    pub fn with_trigger_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.trigger_timeout = timeout;
        self
    }

    /// Hold the audio back to paper over a slow player startup.
    pub fn with_audio_delay(mut self, delay: Duration) -> Self {
        self.audio_delay = delay;
        self
    }

    pub async fn run_show(&self, song: &str, audio_path: &Path) -> Result<ShowReport, ShowError> {
        // Pre-flight: every input exists and the song has a player before
        // anything side-effecting starts. Failing here costs nothing.
        require_file(audio_path)?;
        player_command(audio_path)?;
        for node in &self.nodes {
            require_file(&self.cache.script_path(song, node.transport.node_id()))?;
        }

        self.push_stage(song).await?;

        let audio = self.start_audio(audio_path);
        self.perform(song, audio).await
    }

    /// Back half of a show: scripts are pushed and the player is spawned.
    /// Trigger every node, join the audio, close the show.
    async fn perform(
        &self,
        song: &str,
        audio: JoinHandle<Result<(), ShowError>>,
    ) -> Result<ShowReport, ShowError> {
        let (node_runtimes, node_failures) = self.trigger_stage().await;

        log::info!("Lights done, waiting for the music to finish");
        match audio.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(self.audio_lost(err).await),
            Err(join_err) => {
                return Err(self.audio_lost(ShowError::Audio(join_err.to_string())).await)
            }
        }

        self.finale().await;

        Ok(ShowReport {
            song: song.to_string(),
            node_runtimes,
            node_failures,
        })
    }

    /// Every node gets its script before anything plays. A load failure
    /// aborts the show while it is still dark.
    async fn push_stage(&self, song: &str) -> Result<(), ShowError> {
        for node in &self.nodes {
            let node_id = node.transport.node_id();
            let script = self.cache.load(song, node_id)?;
            let summary = node.transport.load(&script).await?;
            log::info!(
                "[{}] holds {} commands, {:.2}s predicted",
                node_id,
                summary.commands,
                summary.predicted_runtime
            );
        }
        Ok(())
    }

    /// Trigger every node concurrently and join them all. A node that
    /// fails, times out, or panics is recorded and its siblings play on.
    async fn trigger_stage(&self) -> (Vec<(NodeId, f64)>, Vec<(NodeId, String)>) {
        let mut triggers: Vec<(NodeId, JoinHandle<Result<f64, String>>)> = Vec::new();
        for node in &self.nodes {
            let transport = Arc::clone(&node.transport);
            let timeout = self.trigger_timeout;
            let node_id = transport.node_id().clone();
            triggers.push((
                node_id,
                tokio::spawn(async move {
                    let outcome = match timeout {
                        Some(limit) => match tokio::time::timeout(limit, transport.play()).await {
                            Ok(result) => result.map_err(|e| e.to_string()),
                            Err(_) => Err(format!("no reply within {:.0?}", limit)),
                        },
                        None => transport.play().await.map_err(|e| e.to_string()),
                    };
                    outcome.map(|summary| summary.total_runtime)
                }),
            ));
        }

        let mut runtimes = Vec::new();
        let mut failures = Vec::new();
        for (node_id, trigger) in triggers {
            match trigger.await {
                Ok(Ok(runtime)) => {
                    log::info!("[{}] finished in {:.2}s", node_id, runtime);
                    runtimes.push((node_id, runtime));
                }
                Ok(Err(message)) => {
                    log::error!("[{}] play failed: {}", node_id, message);
                    failures.push((node_id, message));
                }
                Err(join_err) => {
                    log::error!("[{}] trigger task died: {}", node_id, join_err);
                    failures.push((node_id, join_err.to_string()));
                }
            }
        }
        (runtimes, failures)
    }

    fn start_audio(&self, audio_path: &Path) -> JoinHandle<Result<(), ShowError>> {
        let delay = self.audio_delay;
        let path = audio_path.to_path_buf();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            AudioProcess::spawn(&path)?.wait().await
        })
    }

    /// The music stopped dead mid-show. Kill the glow on the channels we
    /// own, skip the finale, and hand the failure up.
    async fn audio_lost(&self, err: ShowError) -> ShowError {
        log::error!("audio failed, shutting the lights off: {}", err);
        if let Err(off_err) = self.local.set_all_channels(false).await {
            log::error!("emergency all-off failed: {}", off_err);
        }
        err
    }

    /// End-of-show gesture: every channel on, everywhere, so the display
    /// glows between songs instead of going dark. Best effort; a node that
    /// will not light is already on the report.
    async fn finale(&self) {
        log::info!("Show over, every light on");
        for node in &self.nodes {
            let script = Script::uniform(node.channels.iter().cloned(), true);
            let node_id = node.transport.node_id().clone();
            if let Err(err) = self.light_node(node, script).await {
                log::warn!("[{}] finale skipped: {}", node_id, err);
            }
        }
    }

    async fn light_node(&self, node: &ShowNode, script: Script) -> Result<(), ShowError> {
        node.transport.load(&script).await?;
        node.transport.play().await?;
        Ok(())
    }

    /// Drive every channel on every node to one state; the lights
    /// subcommand and the closing gesture share this path.
    pub async fn set_all(&self, on: bool) -> Result<(), ShowError> {
        for node in &self.nodes {
            let script = Script::uniform(node.channels.iter().cloned(), on);
            self.light_node(node, script).await?;
        }
        Ok(())
    }
}
