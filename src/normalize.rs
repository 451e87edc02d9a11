use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{Result, SubtradError};
use crate::library::{with_suffix, EXTRACTED_MARKERS};
use crate::media::SubtitleConverter;
use crate::subtitle::SubtitleDocument;

/// Subtitle formats recognised on input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    /// Advanced SubStation Alpha
    Ass,
    /// SubStation Alpha
    Ssa,
    WebVtt,
    /// Image based (PGS `.sup`, VobSub `.sub`/`.idx`); needs OCR
    Bitmap,
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "ass" => Some(Self::Ass),
            "ssa" => Some(Self::Ssa),
            "vtt" => Some(Self::WebVtt),
            "sup" | "sub" | "idx" => Some(Self::Bitmap),
            _ => None,
        }
    }

    /// Detect from the file name, looking through extraction markers
    /// (`movie.en.ass.tmp` is ASS)
    pub fn detect(path: &Path) -> Option<Self> {
        Self::from_extension(format_extension(&strip_marker(path))?)
    }

    /// ffmpeg input format name
    pub fn demuxer(&self) -> Option<&'static str> {
        match self {
            Self::Srt => Some("srt"),
            Self::Ass | Self::Ssa => Some("ass"),
            Self::WebVtt => Some("webvtt"),
            Self::Bitmap => None,
        }
    }
}

/// An SRT file ready for translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSource {
    pub path: PathBuf,
    /// True when the file was produced by conversion and may be deleted after the job
    pub is_temporary: bool,
}

fn strip_marker(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if EXTRACTED_MARKERS.contains(&ext.to_lowercase().as_str()) => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

fn format_extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Sibling path receiving the converted SRT (`movie.en.ass.tmp` → `movie.en.normalized.srt`)
pub fn normalized_path_for(source: &Path) -> PathBuf {
    with_suffix(&strip_marker(source).with_extension(""), ".normalized.srt")
}

/// Converted SRT a job on `source` leaves behind, if its format needs conversion
pub fn converted_artifact_for(source: &Path) -> Option<PathBuf> {
    match SubtitleFormat::detect(source)? {
        SubtitleFormat::Ass | SubtitleFormat::Ssa | SubtitleFormat::WebVtt => Some(normalized_path_for(source)),
        SubtitleFormat::Srt | SubtitleFormat::Bitmap => None,
    }
}

fn markup_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // HTML-like tags: <i>, </b>, <font color="...">
            Regex::new(r"</?[a-zA-Z][^<>]*>").expect("valid tag pattern"),
            // ASS override blocks: {\an8}, {\i1\b1}
            Regex::new(r"\{\\[^{}]*\}").expect("valid override pattern"),
        ]
    })
}

/// Remove inline styling markup from cue text
pub fn strip_markup(text: &str) -> String {
    let [tags, overrides] = markup_patterns();
    let without_tags = tags.replace_all(text, "");
    let cleaned = overrides.replace_all(&without_tags, "");

    cleaned
        .replace("\\N", "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns any supported subtitle source into an SRT file
pub struct Normalizer<'a> {
    converter: &'a dyn SubtitleConverter,
}

impl<'a> Normalizer<'a> {
    pub fn new(converter: &'a dyn SubtitleConverter) -> Self {
        Self { converter }
    }

    /// `None` means the source cannot be translated (bitmap or unknown
    /// format, converter failure); the reason is logged.
    pub async fn normalize(&self, source_path: &Path) -> Option<NormalizedSource> {
        match self.try_normalize(source_path).await {
            Ok(normalized) => Some(normalized),
            Err(e) => {
                warn!("  ❌ {}: {}", source_path.display(), e);
                None
            }
        }
    }

    async fn try_normalize(&self, source_path: &Path) -> Result<NormalizedSource> {
        let format = SubtitleFormat::detect(source_path)
            .ok_or_else(|| SubtradError::UnsupportedFormat("unknown extension".to_string()))?;

        let demuxer = match (format, format.demuxer()) {
            (SubtitleFormat::Srt, _) => {
                return Ok(NormalizedSource {
                    path: source_path.to_path_buf(),
                    is_temporary: false,
                });
            }
            (_, Some(demuxer)) => demuxer,
            (_, None) => {
                return Err(SubtradError::UnsupportedFormat("image based subtitle, OCR required".to_string()));
            }
        };

        let target = normalized_path_for(source_path);
        if fs::try_exists(&target).await.unwrap_or(false) {
            info!("  ♻️ Reusing converted file {}", target.display());
            return Ok(NormalizedSource {
                path: target,
                is_temporary: true,
            });
        }

        self.converter.convert_to_srt(source_path, demuxer, &target).await?;

        let mut document = match SubtitleDocument::load(&target).await {
            Ok(document) => document,
            Err(e) => {
                let _ = fs::remove_file(&target).await;
                return Err(SubtradError::Converter(format!("unreadable conversion output: {}", e)));
            }
        };
        document.map_text(strip_markup);
        document.save(&target).await?;

        info!("  🔄 Converted {:?} to SRT: {} cues", format, document.len());
        Ok(NormalizedSource {
            path: target,
            is_temporary: true,
        })
    }
}
