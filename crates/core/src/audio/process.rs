use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::{require_file, ShowError};

/// Pick the player binary for a song file by extension: `.wav` plays
/// through aplay, `.mp3` through mpg123. Anything else has no configured
/// player and is rejected before a show starts.
pub fn player_command(song: &Path) -> Result<(&'static str, Vec<String>), ShowError> {
    let extension = song
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let program = match extension.as_str() {
        "wav" => "aplay",
        "mp3" => "mpg123",
        _ => return Err(ShowError::UnsupportedFormat(extension)),
    };

    Ok((program, vec![song.to_string_lossy().into_owned()]))
}

/// The external audio player for one show: spawned once alongside the
/// light triggers, then awaited to the end of the song.
#[derive(Debug)]
pub struct AudioProcess {
    child: Child,
    song: PathBuf,
}

impl AudioProcess {
    pub fn spawn(song: &Path) -> Result<Self, ShowError> {
        require_file(song)?;
        let (program, args) = player_command(song)?;

        log::info!("Starting audio: {} {}", program, song.display());
        let child = Command::new(program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ShowError::Audio(format!("failed to start {}: {}", program, e)))?;

        Ok(AudioProcess {
            child,
            song: song.to_path_buf(),
        })
    }

    /// Wait for the player to exit. A non-zero status means the song did
    /// not finish and the show it was pacing is unsalvageable.
    pub async fn wait(mut self) -> Result<(), ShowError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ShowError::Audio(e.to_string()))?;

        if status.success() {
            log::info!("Audio finished: {}", self.song.display());
            Ok(())
        } else {
            Err(ShowError::Audio(format!(
                "player exited with {} for {}",
                status,
                self.song.display()
            )))
        }
    }
}
