use std::fs::{self, File};
use std::path::{Path, PathBuf};

use garland_rig::NodeId;

use crate::error::ShowError;
use crate::script::Script;

/// Disk cache of compiled scripts, one JSON file per (song, node) pair.
///
/// Nothing here invalidates stale entries; callers opt out with the
/// no-cache mode when the midi file or mappings change.
pub struct ShowCache {
    dir: PathBuf,
}

impl ShowCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ShowCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn script_path(&self, song: &str, node: &NodeId) -> PathBuf {
        self.dir.join(format!("{}.{}.script.json", song, node))
    }

    pub fn contains(&self, song: &str, node: &NodeId) -> bool {
        self.script_path(song, node).is_file()
    }

    pub fn load(&self, song: &str, node: &NodeId) -> Result<Script, ShowError> {
        let path = self.script_path(song, node);
        log::debug!("Loading cached script: {}", path.display());
        let file = File::open(&path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Replace the cached script for (song, node). Any previous file is
    /// removed first so a rebuild is a clean file swap, and rebuilding the
    /// same scripts writes byte-identical files.
    pub fn store(
        &self,
        song: &str,
        node: &NodeId,
        script: &Script,
    ) -> Result<PathBuf, ShowError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.script_path(song, node);
        if path.exists() {
            log::info!("Removing old cache file: {}", path.display());
            fs::remove_file(&path)?;
        }

        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, script)?;
        Ok(path)
    }
}
