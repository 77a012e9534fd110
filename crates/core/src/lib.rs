pub use audio::{player_command, AudioProcess};
pub use cache::ShowCache;
pub use choreo::{read_note_events, Choreographer, NoteEvent, NoteEventKind};
pub use config::{ShowSettings, SongSettings};
pub use error::{require_file, ShowError};
pub use hardware::{LogBus, MemoryBus, PinBus, RelayBank, RelaySink};
pub use node::{
    read_frame, write_frame, LoadSummary, LocalNode, NodeServer, NodeService, NodeTransport,
    PlaySummary, RemoteNode, Request, Response, MAX_FRAME_LEN,
};
pub use playback::play_script;
pub use script::{Command, Script};
pub use show::{ShowDispatcher, ShowNode, ShowReport};

mod audio;
mod cache;
mod choreo;
mod config;
mod error;
mod hardware;
mod node;
mod playback;
mod script;
mod show;
