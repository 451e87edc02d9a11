use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checkpoint::{display_name, CheckpointStore};
use crate::config::{Config, RunMode};
use crate::error::{Result, SubtradError};
use crate::library::{is_extracted_track, scan_videos, VideoPaths};
use crate::matrix::CooldownMatrix;
use crate::media::{ConverterFactory, SubtitleConverter};
use crate::normalize::{converted_artifact_for, Normalizer};
use crate::progress::ProgressEstimator;
use crate::schedule::{check_interrupt, sleep_interruptible, QuotaResetScheduler};
use crate::subtitle::SubtitleDocument;
use crate::translate::{
    format_duration, split_response_lines, translate_batch_text, ProviderFactory, TranslationProvider,
};

/// Steps of one translation job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    DiscoverSource,
    Normalize,
    LoadDocument,
    ResumeCheck,
    Translating,
    Cleanup,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DiscoverSource => "discover source",
            Self::Normalize => "normalize",
            Self::LoadDocument => "load document",
            Self::ResumeCheck => "resume check",
            Self::Translating => "translating",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every cue translated in this run
    Completed,
    /// Output was already complete; nothing sent to the provider
    AlreadyDone,
    NoSource,
    Unsupported,
    LoadError,
    /// Every credential cell is cooling down and the run is single-pass.
    /// The checkpoint is kept for the next run.
    Exhausted,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::AlreadyDone => "already translated",
            Self::NoSource => "no English subtitle",
            Self::Unsupported => "unsupported format",
            Self::LoadError => "unreadable subtitle",
            Self::Exhausted => "credentials exhausted",
        };
        f.write_str(name)
    }
}

/// Outcome counts for one library pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub already_done: usize,
    pub no_source: usize,
    pub unsupported: usize,
    pub load_errors: usize,
    pub errors: usize,
    pub exhausted: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::AlreadyDone => self.already_done += 1,
            JobOutcome::NoSource => self.no_source += 1,
            JobOutcome::Unsupported => self.unsupported += 1,
            JobOutcome::LoadError => self.load_errors += 1,
            JobOutcome::Exhausted => self.exhausted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed
            + self.already_done
            + self.no_source
            + self.unsupported
            + self.load_errors
            + self.errors
            + self.exhausted
    }

    fn log(&self) {
        info!("📊 Pass summary ({} videos):", self.total());
        info!("  ✅ Translated: {}", self.completed);
        info!("  ⏭️ Already done: {}", self.already_done);
        info!("  🚫 No English subtitle: {}", self.no_source);
        if self.unsupported > 0 {
            info!("  🖼️ Unsupported format: {}", self.unsupported);
        }
        if self.load_errors + self.errors > 0 {
            info!("  ❌ Errors: {}", self.load_errors + self.errors);
        }
        if self.exhausted > 0 {
            info!("  ⛔ Stopped on exhausted credentials");
        }
    }
}

/// What was found at the output location before starting
enum ExistingOutput {
    Fresh,
    Complete,
    /// Checkpoint covers every cue; cleanup did not run yet
    Finished,
    Partial { document: SubtitleDocument, last_index: usize },
}

pub struct Workflow {
    config: Config,
    provider: Box<dyn TranslationProvider>,
    converter: Box<dyn SubtitleConverter>,
    matrix: CooldownMatrix,
    scheduler: QuotaResetScheduler,
    checkpoints: CheckpointStore,
    interrupt: CancellationToken,
}

impl Workflow {
    /// `interrupt` is shared by the whole run; cancelling it stops the job at
    /// the next request, sleep or batch boundary.
    pub fn new(config: Config, interrupt: CancellationToken) -> Result<Self> {
        let provider = ProviderFactory::create_provider(&config.translate)?;
        let converter = ConverterFactory::create_converter(config.media.clone());
        Self::with_components(config, provider, converter, interrupt)
    }

    pub fn with_components(
        config: Config,
        provider: Box<dyn TranslationProvider>,
        converter: Box<dyn SubtitleConverter>,
        interrupt: CancellationToken,
    ) -> Result<Self> {
        let matrix = CooldownMatrix::from_config(&config.translate.models, &config.translate.api_keys);
        let scheduler = QuotaResetScheduler::from_config(&config.quota)?;
        info!(
            "🔑 {} credential cell(s) across models {:?}",
            matrix.cell_count(),
            matrix.models()
        );

        Ok(Self {
            config,
            provider,
            converter,
            matrix,
            scheduler,
            checkpoints: CheckpointStore::new(),
            interrupt,
        })
    }

    pub fn converter(&self) -> &dyn SubtitleConverter {
        self.converter.as_ref()
    }

    /// Scan the configured folders. Continuous mode rescans every
    /// `watch_interval_seconds` and only returns on interrupt.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let folders = self.config.run.source_folders.clone();
        if folders.is_empty() {
            return Err(SubtradError::Config("no source folders configured".to_string()));
        }

        loop {
            let summary = self.run_library_pass(&folders).await?;

            if self.config.run.mode == RunMode::SinglePass {
                return Ok(summary);
            }

            let interval = self.config.run.watch_interval_seconds;
            info!("👀 Next scan in {}", format_duration(interval));
            sleep_interruptible(std::time::Duration::from_secs(interval), &self.interrupt).await?;
        }
    }

    /// Translate every video under `folders` that lacks a French subtitle.
    /// Stops early when credentials run out in single-pass mode.
    pub async fn run_library_pass(&mut self, folders: &[PathBuf]) -> Result<RunSummary> {
        let videos = scan_videos(folders);
        info!("📂 {} video(s) found", videos.len());

        let mut summary = RunSummary::default();

        for video in videos {
            check_interrupt(&self.interrupt)?;
            let paths = VideoPaths::new(&video);
            if let Some(sidecar) = paths.french_sidecar() {
                debug!("Skipping {}: French subtitle {} present", display_name(&video), display_name(&sidecar));
                summary.record(JobOutcome::AlreadyDone);
                continue;
            }

            match self.translate_video(&video).await {
                Ok(outcome) => {
                    summary.record(outcome);
                    if outcome == JobOutcome::Exhausted {
                        warn!("⛔ No credentials left, ending this pass");
                        break;
                    }
                }
                Err(SubtradError::Interrupted) => return Err(SubtradError::Interrupted),
                Err(e) => {
                    warn!("  ❌ {}: {}", display_name(&video), e);
                    summary.errors += 1;
                }
            }
        }

        summary.log();
        Ok(summary)
    }

    /// Translate the English subtitle belonging to `video` into `<base>.fr.srt`
    pub async fn translate_video(&mut self, video: &Path) -> Result<JobOutcome> {
        let paths = VideoPaths::new(video);
        let output = paths.output_path();
        let name = display_name(video);
        info!("🎬 {}", name);

        self.enter(&name, JobState::DiscoverSource);
        let existing = match self.inspect_output(&output).await? {
            ExistingOutput::Complete => return Ok(self.finish(&name, JobOutcome::AlreadyDone)),
            ExistingOutput::Finished => {
                self.enter(&name, JobState::Cleanup);
                self.cleanup(paths.find_english_subtitle().as_deref(), &output).await;
                return Ok(self.finish(&name, JobOutcome::AlreadyDone));
            }
            existing => existing,
        };

        let Some(source) = paths.find_english_subtitle() else {
            debug!("  {}", SubtradError::SourceMissing(name.clone()));
            return Ok(self.finish(&name, JobOutcome::NoSource));
        };
        info!("  📄 Source: {}", display_name(&source));

        self.process_source(&name, &source, &output, existing).await
    }

    /// Translate an explicit subtitle file
    pub async fn translate_file(&mut self, source: &Path, output: &Path) -> Result<JobOutcome> {
        let name = display_name(source);
        info!("🎬 {}", name);

        self.enter(&name, JobState::DiscoverSource);
        let existing = match self.inspect_output(output).await? {
            ExistingOutput::Complete => return Ok(self.finish(&name, JobOutcome::AlreadyDone)),
            ExistingOutput::Finished => {
                self.enter(&name, JobState::Cleanup);
                self.cleanup(Some(source).filter(|s| s.is_file()), output).await;
                return Ok(self.finish(&name, JobOutcome::AlreadyDone));
            }
            existing => existing,
        };

        if !source.is_file() {
            warn!("  ❌ {}", SubtradError::SourceMissing(source.display().to_string()));
            return Ok(self.finish(&name, JobOutcome::NoSource));
        }

        self.process_source(&name, source, output, existing).await
    }

    fn enter(&self, name: &str, state: JobState) {
        debug!("  [{}] {}", name, state);
    }

    fn finish(&self, name: &str, outcome: JobOutcome) -> JobOutcome {
        match outcome {
            JobOutcome::Completed | JobOutcome::AlreadyDone => info!("  ✅ {}: {}", name, outcome),
            _ => warn!("  ⚠️ {}: {}", name, outcome),
        }
        outcome
    }

    async fn inspect_output(&self, output: &Path) -> Result<ExistingOutput> {
        let output_exists = fs::try_exists(output).await.unwrap_or(false);
        let has_checkpoint = self.checkpoints.exists(output).await;

        match (output_exists, has_checkpoint) {
            (true, false) => Ok(ExistingOutput::Complete),
            (false, false) => Ok(ExistingOutput::Fresh),
            (false, true) => {
                warn!("  ⚠️ Checkpoint without output for {}, starting over", display_name(output));
                Ok(ExistingOutput::Fresh)
            }
            (true, true) => {
                let last_index = self.checkpoints.load(output).await;
                let document = match SubtitleDocument::load(output).await {
                    Ok(document) => document,
                    Err(e) => {
                        warn!("  ⚠️ Partial output unreadable ({}), starting over", e);
                        return Ok(ExistingOutput::Fresh);
                    }
                };

                if last_index >= document.len() {
                    info!("  ✅ Checkpoint shows {} complete", display_name(output));
                    return Ok(ExistingOutput::Finished);
                }

                Ok(ExistingOutput::Partial { document, last_index })
            }
        }
    }

    async fn process_source(
        &mut self,
        name: &str,
        source: &Path,
        output: &Path,
        existing: ExistingOutput,
    ) -> Result<JobOutcome> {
        self.enter(name, JobState::Normalize);
        let Some(normalized) = Normalizer::new(self.converter.as_ref()).normalize(source).await else {
            return Ok(self.finish(name, JobOutcome::Unsupported));
        };

        self.enter(name, JobState::LoadDocument);
        let source_document = match SubtitleDocument::load(&normalized.path).await {
            Ok(document) if document.is_empty() => {
                warn!("  ❌ {} has no cues", display_name(&normalized.path));
                return Ok(self.finish(name, JobOutcome::LoadError));
            }
            Ok(document) => document,
            Err(e) => {
                warn!("  ❌ {}", e);
                return Ok(self.finish(name, JobOutcome::LoadError));
            }
        };

        self.enter(name, JobState::ResumeCheck);
        let (mut document, start) = match existing {
            ExistingOutput::Partial { document, last_index } if document.len() == source_document.len() => {
                info!("  ⏯️ Resuming at cue {}/{}", last_index, document.len());
                (document, last_index)
            }
            ExistingOutput::Partial { document, .. } => {
                warn!(
                    "  ⚠️ Partial output has {} cues but source has {}, starting over",
                    document.len(),
                    source_document.len()
                );
                (source_document, 0)
            }
            _ => (source_document, 0),
        };

        self.enter(name, JobState::Translating);
        if !self.translate_document(&mut document, start, output).await? {
            return Ok(self.finish(name, JobOutcome::Exhausted));
        }

        self.enter(name, JobState::Cleanup);
        self.cleanup(Some(source), output).await;

        self.enter(name, JobState::Done);
        Ok(self.finish(name, JobOutcome::Completed))
    }

    /// Translate cues `start..` batch by batch, persisting output then
    /// checkpoint after each one. Returns false when credentials ran out.
    async fn translate_document(
        &mut self,
        document: &mut SubtitleDocument,
        mut start: usize,
        output: &Path,
    ) -> Result<bool> {
        let total = document.len();
        let batch_size = self.config.translate.batch_size;
        let pause = self.config.translate.pause();
        let mut progress = ProgressEstimator::new(total, batch_size);
        let job_started = Instant::now();

        while start < total {
            check_interrupt(&self.interrupt)?;
            let batch_started = Instant::now();
            let end = (start + batch_size).min(total);
            info!(
                "  📝 Cues {}-{} / {} ({:.0}%)",
                start + 1,
                end,
                total,
                progress.percent(start)
            );

            let text = document.batch_lines(start..end).join("\n");
            let response = match self.request_translation(&text).await {
                Ok(response) => response,
                Err(SubtradError::AllCredentialsExhausted) => {
                    warn!("  ⛔ All credentials exhausted at cue {}/{}", start, total);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            };

            let lines = split_response_lines(&response);
            let expected = end - start;
            let applied = document.apply_lines(start, expected, &lines);
            if applied < expected {
                warn!(
                    "  ⚠️ Got {} lines for {} cues, {} left untranslated",
                    lines.len(),
                    expected,
                    expected - applied
                );
            }

            document.save(output).await?;
            self.checkpoints.save(output, end).await?;

            if end < total {
                sleep_interruptible(pause, &self.interrupt).await?;
            }

            progress.record(batch_started.elapsed());
            if end < total {
                if let Some(remaining) = progress.remaining(end) {
                    let finish = Utc::now() + chrono::Duration::from_std(remaining).unwrap_or(chrono::Duration::zero());
                    info!(
                        "  ⏱️ About {} left, done around {}",
                        format_duration(remaining.as_secs()),
                        finish.with_timezone(&self.scheduler.timezone()).format("%H:%M")
                    );
                }
            }

            start = end;
        }

        info!(
            "  🎉 {} cues translated in {}",
            total,
            format_duration(job_started.elapsed().as_secs())
        );
        Ok(true)
    }

    /// Send one batch through the first available cell, rotating through the
    /// matrix on failure. When every cell is cooling down, continuous mode
    /// waits for the quota reset; single-pass mode gives up.
    async fn request_translation(&mut self, text: &str) -> Result<String> {
        let retry_delay = self.config.translate.empty_retry_delay();
        let cooldown = self.config.translate.cooldown();

        loop {
            let attempt = match self.matrix.next_available() {
                Some(cell) => {
                    debug!("  🔑 Using {}", cell);
                    let result =
                        translate_batch_text(self.provider.as_ref(), &cell, text, retry_delay, &self.interrupt)
                            .await;
                    Some((cell.id, result))
                }
                None => None,
            };

            match attempt {
                Some((_, Ok(response))) => return Ok(response),
                Some((_, Err(SubtradError::Interrupted))) => return Err(SubtradError::Interrupted),
                Some((id, Err(e))) => {
                    if e.is_rate_limit_class() {
                        warn!("  ⚠️ {}", e);
                    } else {
                        warn!("  ❌ Provider error: {}", e);
                    }
                    self.matrix.block(id, cooldown);
                }
                None => match self.config.run.mode {
                    RunMode::Continuous => self.scheduler.await_reset(&mut self.matrix, &self.interrupt).await?,
                    RunMode::SinglePass => return Err(SubtradError::AllCredentialsExhausted),
                },
            }
        }
    }

    /// Remove the artifacts of a finished job. `source` is `None` when the
    /// English subtitle is already gone.
    async fn cleanup(&self, source: Option<&Path>, output: &Path) {
        let cleanup = &self.config.cleanup;

        if cleanup.delete_checkpoint {
            if let Err(e) = self.checkpoints.clear(output).await {
                warn!("  ⚠️ Could not remove checkpoint: {}", e);
            }
        }

        let Some(source) = source else {
            return;
        };

        if cleanup.delete_converted {
            if let Some(converted) = converted_artifact_for(source) {
                remove_artifact(&converted).await;
            }
        }

        if cleanup.delete_extracted_source && is_extracted_track(source) {
            remove_artifact(source).await;
        }
    }
}

async fn remove_artifact(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => info!("  🗑️ Cleanup: {} removed", display_name(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("  ⚠️ Could not remove {}: {}", path.display(), e),
    }
}
