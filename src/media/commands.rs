use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SubtradError};

/// External converter invocation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Force the input demuxer
    pub fn input_format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-f").arg(format)
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Only report errors on stderr
    pub fn quiet(self) -> Self {
        self.arg("-loglevel").arg("error")
    }

    /// Set subtitle codec
    pub fn subtitle_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:s").arg(codec)
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        debug!("Executing converter command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SubtradError::Converter(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubtradError::Converter(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Builder for the converter operations this crate needs
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build a subtitle-to-SRT conversion command. The input demuxer is given
    /// explicitly because extracted tracks carry a `.tmp` suffix.
    pub fn convert_to_srt<P: AsRef<Path>>(&self, input_path: P, demuxer: &str, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, format!("Subtitle conversion ({} -> srt)", demuxer))
            .overwrite()
            .quiet()
            .input_format(demuxer)
            .input(input_path)
            .subtitle_codec("srt")
            .arg("-f")
            .arg("srt")
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}
