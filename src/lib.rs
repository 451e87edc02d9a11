//! Subtrad - Batch English to French subtitle translation
//!
//! Scans a media library for English subtitles, normalizes them to SRT and
//! translates them in resumable batches through hosted language models,
//! rotating API keys and models as quotas run out.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod library;
pub mod matrix;
pub mod media;
pub mod normalize;
pub mod progress;
pub mod schedule;
pub mod subtitle;
pub mod translate;
pub mod workflow;
