use std::io;
use std::path::{Path, PathBuf};

use garland_rig::{ChannelId, NodeId, RigError};
use thiserror::Error;

/// Anything that can go wrong while building or running a show.
#[derive(Debug, Error)]
pub enum ShowError {
    /// Static configuration is missing or structurally wrong.
    #[error("config error: {0}")]
    Config(String),

    #[error("song {0:?} is not defined in the configuration")]
    UnknownSong(String),

    /// A note, pitch, or channel had no configured mapping. Raised while
    /// compiling scripts, never during playback.
    #[error(transparent)]
    Rig(#[from] RigError),

    #[error("{} is not a file", .0.display())]
    MissingInput(PathBuf),

    #[error("no audio player configured for {0:?} files")]
    UnsupportedFormat(String),

    #[error("failed to parse midi file {}: {message}", .path.display())]
    MidiParse { path: PathBuf, message: String },

    #[error("hardware write failed on channel {channel}: {message}")]
    HardwareWrite { channel: ChannelId, message: String },

    #[error("node {node}: {message}")]
    RemoteNode { node: NodeId, message: String },

    #[error("node {0} is busy with another operation")]
    NodeBusy(NodeId),

    #[error("audio player failed: {0}")]
    Audio(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pre-flight check used on every input path before side effects begin.
pub fn require_file(path: &Path) -> Result<(), ShowError> {
    if path.is_file() {
        Ok(())
    } else {
        log::error!("{} is not a file", path.display());
        Err(ShowError::MissingInput(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_file_missing() {
        let err = require_file(Path::new("/no/such/thing.mid")).unwrap_err();
        assert!(matches!(err, ShowError::MissingInput(_)));
        assert_eq!(err.to_string(), "/no/such/thing.mid is not a file");
    }

    #[test]
    fn test_rig_errors_pass_through() {
        let err: ShowError = RigError::UnknownNote(61).into();
        assert_eq!(err.to_string(), "no pitch name configured for midi note 61");
    }
}
