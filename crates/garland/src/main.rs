use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use garland_core::{
    Choreographer, LocalNode, LogBus, NodeServer, NodeService, NodeTransport, RelayBank,
    RemoteNode, ShowCache, ShowDispatcher, ShowNode, ShowSettings,
};
use garland_rig::NodeId;

/// The node the dispatcher itself runs on; it plays in process instead of
/// over the wire.
const MASTER_NODE: &str = "master";

/// Synchronized musical light shows for a relay-driven display.
#[derive(Parser, Debug)]
#[command(name = "garland")]
#[command(about = "MIDI-driven relay light show controller")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile songs' midi files into per-node scripts
    Choreograph {
        /// Songs to compile; defaults to every configured song
        songs: Vec<String>,

        /// Ignore cached scripts and rebuild from midi
        #[arg(long)]
        no_cache: bool,
    },
    /// Run a full show: push scripts, trigger every node, play the audio
    Play {
        song: String,

        /// Ignore cached scripts and rebuild from midi
        #[arg(long)]
        no_cache: bool,

        /// Seconds to hold the audio back after triggering the lights
        #[arg(long, default_value = "0.0")]
        audio_delay: f64,
    },
    /// Run the receiving service for one node
    Serve {
        /// Which configured node this process is
        #[arg(long)]
        node: String,

        /// Bind address; defaults to 0.0.0.0 on the node's configured port
        #[arg(long)]
        bind: Option<String>,
    },
    /// Force every channel on every node to one state
    Lights {
        #[arg(value_enum)]
        state: LightState,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LightState {
    On,
    Off,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let settings = ShowSettings::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    match args.command {
        Commands::Choreograph { songs, no_cache } => choreograph(&settings, songs, no_cache),
        Commands::Play {
            song,
            no_cache,
            audio_delay,
        } => play(&settings, &song, no_cache, audio_delay).await,
        Commands::Serve { node, bind } => serve(&settings, &node, bind).await,
        Commands::Lights { state } => lights(&settings, matches!(state, LightState::On)).await,
    }
}

fn choreograph(settings: &ShowSettings, songs: Vec<String>, no_cache: bool) -> anyhow::Result<()> {
    let songs = if songs.is_empty() {
        settings.songs.keys().cloned().collect()
    } else {
        songs
    };

    let cache = ShowCache::new(&settings.cache_dir);
    for song in &songs {
        let song_settings = settings.song(song)?;
        let map = settings.channel_map(song)?;
        let choreographer = if no_cache {
            Choreographer::new(&map).without_cache()
        } else {
            Choreographer::new(&map)
        };

        let scripts = choreographer
            .build_song(song, &song_settings.midi, &cache)
            .with_context(|| format!("compiling {:?}", song))?;

        for (node, script) in &scripts {
            log::info!(
                "[{}] {} commands, {:.2}s predicted",
                node,
                script.len(),
                script.total_timeout()
            );
        }
    }
    Ok(())
}

async fn play(
    settings: &ShowSettings,
    song: &str,
    no_cache: bool,
    audio_delay: f64,
) -> anyhow::Result<()> {
    let song_settings = settings.song(song)?;
    let map = settings.channel_map(song)?;
    let cache = ShowCache::new(&settings.cache_dir);

    // Make sure every node's script is compiled before anyone is called.
    let choreographer = if no_cache {
        Choreographer::new(&map).without_cache()
    } else {
        Choreographer::new(&map)
    };
    choreographer
        .build_song(song, &song_settings.midi, &cache)
        .with_context(|| format!("compiling {:?}", song))?;

    let (nodes, local) = build_show_nodes(settings);
    let dispatcher = ShowDispatcher::new(cache, nodes, local)
        .with_trigger_timeout(settings.trigger_timeout())
        .with_audio_delay(Duration::from_secs_f64(audio_delay.max(0.0)));

    // A stray ctrl-c mid-show would strand relays half lit. Swallow it and
    // let the show close itself out.
    tokio::spawn(async {
        loop {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("ignoring ctrl-c until the show closes");
            }
        }
    });

    let report = dispatcher.run_show(song, &song_settings.audio).await?;
    if report.is_clean() {
        log::info!("Show {:?} finished clean", report.song);
    } else {
        for (node, message) in &report.node_failures {
            log::warn!("[{}] failed during the show: {}", node, message);
        }
    }
    Ok(())
}

async fn serve(settings: &ShowSettings, node: &str, bind: Option<String>) -> anyhow::Result<()> {
    let node_id = NodeId::new(node);
    let config = settings.node(&node_id)?;

    let bank = RelayBank::new(config.channels.clone(), LogBus);
    let service = Arc::new(NodeService::new(node_id, Box::new(bank)));

    let bind_addr = bind.unwrap_or_else(|| format!("0.0.0.0:{}", config.port));
    NodeServer::new(service).serve(&bind_addr).await?;
    Ok(())
}

async fn lights(settings: &ShowSettings, on: bool) -> anyhow::Result<()> {
    let (nodes, local) = build_show_nodes(settings);
    let dispatcher = ShowDispatcher::new(ShowCache::new(&settings.cache_dir), nodes, local);
    dispatcher.set_all(on).await?;
    log::info!("All channels {}", if on { "on" } else { "off" });
    Ok(())
}

/// One transport per configured node: the master in process, everyone else
/// over the wire. A rig without a "master" entry still works; the local
/// service just owns no channels.
fn build_show_nodes(settings: &ShowSettings) -> (Vec<ShowNode>, Arc<NodeService>) {
    let master_id = NodeId::new(MASTER_NODE);
    let master_channels = settings
        .nodes
        .get(&master_id)
        .map(|node| node.channels.clone())
        .unwrap_or_else(BTreeMap::new);
    let local = Arc::new(NodeService::new(
        master_id.clone(),
        Box::new(RelayBank::new(master_channels, LogBus)),
    ));

    let mut nodes = Vec::new();
    for (node_id, node) in &settings.nodes {
        let transport: Arc<dyn NodeTransport> = if *node_id == master_id {
            Arc::new(LocalNode::new(Arc::clone(&local)))
        } else {
            Arc::new(RemoteNode::new(node_id.clone(), node.address()))
        };
        nodes.push(ShowNode {
            transport,
            channels: node.channel_ids().cloned().collect(),
        });
    }

    (nodes, local)
}
