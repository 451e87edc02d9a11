//! Durable record of how far a translation job got.
//!
//! The record lives next to the output (`movie.fr.srt` →
//! `movie.fr.progress.json`) and holds the index of the first cue that is not
//! yet translated. It only ever moves forward after the output file has been
//! rewritten, so after a crash at most one batch is translated twice.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::subtitle::write_atomically;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_index: usize,
}

/// Checkpoint file path for a given output path
pub fn progress_path_for(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    output_path.with_file_name(format!("{}.progress.json", stem))
}

#[derive(Debug, Default, Clone)]
pub struct CheckpointStore;

impl CheckpointStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn exists(&self, output_path: &Path) -> bool {
        fs::try_exists(progress_path_for(output_path)).await.unwrap_or(false)
    }

    /// Resume offset for the job writing `output_path`; 0 when absent or unreadable
    pub async fn load(&self, output_path: &Path) -> usize {
        let path = progress_path_for(output_path);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Failed to read checkpoint {}: {}", path.display(), e);
                return 0;
            }
        };

        match serde_json::from_str::<Checkpoint>(&content) {
            Ok(checkpoint) => checkpoint.last_index,
            Err(e) => {
                warn!("Ignoring corrupt checkpoint {}: {}", path.display(), e);
                0
            }
        }
    }

    pub async fn save(&self, output_path: &Path, last_index: usize) -> Result<()> {
        let path = progress_path_for(output_path);
        let content = serde_json::to_vec(&Checkpoint { last_index })?;
        write_atomically(&path, &content).await?;
        debug!("Checkpoint {} -> {}", path.display(), last_index);
        Ok(())
    }

    pub async fn clear(&self, output_path: &Path) -> Result<()> {
        let path = progress_path_for(output_path);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("  🗑️ Cleanup: {} removed", display_name(&path));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
