use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SubtradError};
use super::{MediaCommandBuilder, SubtitleConverter};

/// ffmpeg-backed subtitle converter
pub struct FfmpegConverter {
    command_builder: MediaCommandBuilder,
}

impl FfmpegConverter {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(&config.converter_path),
        }
    }
}

#[async_trait]
impl SubtitleConverter for FfmpegConverter {
    async fn convert_to_srt(&self, input_path: &Path, demuxer: &str, output_path: &Path) -> Result<()> {
        info!("Converting {} ({}) -> {}", input_path.display(), demuxer, output_path.display());

        let command = self.command_builder.convert_to_srt(input_path, demuxer, output_path);
        command.execute().await?;

        // ffmpeg can exit cleanly without producing a file for an empty track
        if !fs::try_exists(output_path).await.unwrap_or(false) {
            return Err(SubtradError::Converter(format!(
                "Converter produced no output at {}",
                output_path.display()
            )));
        }

        debug!("Subtitle conversion completed");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        let command = self.command_builder.version_check();
        let output = tokio::process::Command::new(&command.binary_path)
            .args(&command.args)
            .output()
            .await
            .map_err(|e| SubtradError::Converter(format!("Converter not found: {}", e)))?;

        if output.status.success() {
            let version_info = String::from_utf8_lossy(&output.stdout);
            let first_line = version_info.lines().next().unwrap_or("Unknown version");
            Ok(first_line.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SubtradError::Converter(format!("Converter version check failed: {}", stderr)))
        }
    }
}
