//! File naming conventions around a video in the media library.
//!
//! For `Movie.mkv` the engine reads `Movie.en.<ext>.tmp` (a track extracted
//! from the container), `Movie.en.<ext>` / `Movie.eng.<ext>` or `Movie.<ext>`,
//! and writes `Movie.fr.srt` plus `Movie.fr.progress.json` while in progress.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "m4v", "webm", "flv", "wmv"];
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sup"];
/// Suffixes appended to tracks extracted from a container
pub const EXTRACTED_MARKERS: &[&str] = &["tmp", "txt"];

const ENGLISH_CODES: &[&str] = &["en", "eng"];
const FRENCH_CODES: &[&str] = &["fr", "fra", "fre", "french"];

/// Append `suffix` to a path without touching its existing extension
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Translated output path for an English subtitle or video base name
pub fn output_path_for_base(base: &Path) -> PathBuf {
    with_suffix(base, ".fr.srt")
}

/// Translated output path for a standalone subtitle
/// (`movie.en.ass.tmp`, `movie.eng.srt` and `movie.srt` all give `movie.fr.srt`)
pub fn output_path_for_subtitle(source: &Path) -> PathBuf {
    let mut base = if is_extracted_track(source) {
        source.with_extension("").with_extension("")
    } else {
        source.with_extension("")
    };

    let has_english_code = base
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|code| ENGLISH_CODES.contains(&code.to_lowercase().as_str()));
    if has_english_code {
        base = base.with_extension("");
    }

    output_path_for_base(&base)
}

/// Whether `path` is a track extracted from a container (`*.en.<ext>.tmp`)
pub fn is_extracted_track(path: &Path) -> bool {
    let Some(marker) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !EXTRACTED_MARKERS.contains(&marker.to_lowercase().as_str()) {
        return false;
    }
    let inner = path.with_extension("");
    inner
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

pub fn is_trailer(file_name: &str) -> bool {
    file_name.to_lowercase().contains("-trailer")
}

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Paths derived from one video file
#[derive(Debug, Clone)]
pub struct VideoPaths {
    pub video: PathBuf,
    pub base: PathBuf,
}

impl VideoPaths {
    pub fn new(video: &Path) -> Self {
        Self {
            video: video.to_path_buf(),
            base: video.with_extension(""),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        output_path_for_base(&self.base)
    }

    /// English subtitle to translate, by priority: extracted track, external
    /// file with a language code, external file without one.
    pub fn find_english_subtitle(&self) -> Option<PathBuf> {
        self.extracted_tracks()
            .into_iter()
            .chain(ENGLISH_CODES.iter().flat_map(|lang| {
                SUBTITLE_EXTENSIONS
                    .iter()
                    .map(move |ext| with_suffix(&self.base, &format!(".{}.{}", lang, ext)))
            }))
            .chain(SUBTITLE_EXTENSIONS.iter().map(|ext| with_suffix(&self.base, &format!(".{}", ext))))
            .find(|candidate| candidate.is_file())
    }

    /// Extracted tracks present on disk
    pub fn extracted_tracks(&self) -> Vec<PathBuf> {
        SUBTITLE_EXTENSIONS
            .iter()
            .flat_map(|ext| {
                EXTRACTED_MARKERS
                    .iter()
                    .map(move |marker| with_suffix(&self.base, &format!(".en.{}.{}", ext, marker)))
            })
            .filter(|candidate| candidate.is_file())
            .collect()
    }

    /// A French subtitle other than this engine's own output
    pub fn french_sidecar(&self) -> Option<PathBuf> {
        let own_output = self.output_path();
        FRENCH_CODES
            .iter()
            .flat_map(|lang| {
                SUBTITLE_EXTENSIONS
                    .iter()
                    .map(move |ext| with_suffix(&self.base, &format!(".{}.{}", lang, ext)))
            })
            .filter(|candidate| *candidate != own_output)
            .find(|candidate| candidate.is_file())
    }
}

/// Video files under `folders`, trailers excluded, in a stable order
pub fn scan_videos(folders: &[PathBuf]) -> Vec<PathBuf> {
    let mut videos = Vec::new();

    for folder in folders {
        if !folder.is_dir() {
            warn!("  ⚠️ Folder {} does not exist, skipped", folder.display());
            continue;
        }

        for entry in WalkDir::new(folder).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !is_video(entry.path()) {
                continue;
            }
            if is_trailer(&entry.file_name().to_string_lossy()) {
                continue;
            }
            videos.push(entry.path().to_path_buf());
        }
    }

    videos
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_output_path_keeps_dots_in_name() {
        let paths = VideoPaths::new(Path::new("/media/Movie.2020.1080p.mkv"));
        assert_eq!(paths.output_path(), PathBuf::from("/media/Movie.2020.1080p.fr.srt"));
    }

    #[test]
    fn test_output_path_for_subtitle() {
        let expected = PathBuf::from("/m/movie.fr.srt");
        assert_eq!(output_path_for_subtitle(Path::new("/m/movie.en.ass.tmp")), expected);
        assert_eq!(output_path_for_subtitle(Path::new("/m/movie.eng.srt")), expected);
        assert_eq!(output_path_for_subtitle(Path::new("/m/movie.srt")), expected);
    }

    #[test]
    fn test_extracted_track_detection() {
        assert!(is_extracted_track(Path::new("movie.en.ass.tmp")));
        assert!(is_extracted_track(Path::new("movie.en.srt.txt")));
        assert!(!is_extracted_track(Path::new("movie.en.srt")));
        assert!(!is_extracted_track(Path::new("notes.txt")));
    }

    #[test]
    fn test_source_priority() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("movie.mkv");
        fs::write(&video, b"").unwrap();
        let paths = VideoPaths::new(&video);

        assert_eq!(paths.find_english_subtitle(), None);

        fs::write(dir.path().join("movie.srt"), b"").unwrap();
        assert_eq!(paths.find_english_subtitle(), Some(dir.path().join("movie.srt")));

        fs::write(dir.path().join("movie.eng.ass"), b"").unwrap();
        assert_eq!(paths.find_english_subtitle(), Some(dir.path().join("movie.eng.ass")));

        fs::write(dir.path().join("movie.en.ssa"), b"").unwrap();
        assert_eq!(paths.find_english_subtitle(), Some(dir.path().join("movie.en.ssa")));

        fs::write(dir.path().join("movie.en.vtt.tmp"), b"").unwrap();
        assert_eq!(paths.find_english_subtitle(), Some(dir.path().join("movie.en.vtt.tmp")));
    }

    #[test]
    fn test_french_sidecar_ignores_own_output() {
        let dir = tempfile::tempdir().unwrap();
        let paths = VideoPaths::new(&dir.path().join("movie.mkv"));

        fs::write(dir.path().join("movie.fr.srt"), b"").unwrap();
        assert_eq!(paths.french_sidecar(), None);

        fs::write(dir.path().join("movie.fre.srt"), b"").unwrap();
        assert_eq!(paths.french_sidecar(), Some(dir.path().join("movie.fre.srt")));
    }

    #[test]
    fn test_scan_skips_trailers_and_non_videos() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Show/Season 1");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("e01.mkv"), b"").unwrap();
        fs::write(nested.join("e01.en.srt"), b"").unwrap();
        fs::write(dir.path().join("movie-trailer.mp4"), b"").unwrap();
        fs::write(dir.path().join("movie.MP4"), b"").unwrap();

        let videos = scan_videos(&[dir.path().to_path_buf(), dir.path().join("missing")]);
        assert_eq!(videos, vec![dir.path().join("Show/Season 1/e01.mkv"), dir.path().join("movie.MP4")]);
    }
}
