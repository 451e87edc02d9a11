// External subtitle conversion
//
// - Commands: command builders for the converter binary
// - Processor: ffmpeg implementation of SubtitleConverter

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Converts styled or web caption formats into SRT
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubtitleConverter: Send + Sync {
    /// Convert `input_path`, read with the `demuxer` input format, into an SRT file
    async fn convert_to_srt(&self, input_path: &Path, demuxer: &str, output_path: &Path) -> Result<()>;

    /// Get converter version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating converter instances
pub struct ConverterFactory;

impl ConverterFactory {
    /// Create the default converter implementation (ffmpeg-based)
    pub fn create_converter(config: MediaConfig) -> Box<dyn SubtitleConverter> {
        Box::new(processor::FfmpegConverter::new(config))
    }
}
