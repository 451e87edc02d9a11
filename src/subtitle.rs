use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{Result, SubtradError};

/// One timed subtitle block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Position in the document, starting at 0
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Cue text, lines separated by `\n`
    pub text: String,
}

/// Encoding the source bytes were decoded from. Output is always written as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Utf8Bom,
    /// Not valid UTF-8; bytes were mapped one to one as Latin-1
    Latin1,
}

/// Ordered sequence of cues parsed from an SRT file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleDocument {
    pub cues: Vec<Cue>,
    pub encoding: SourceEncoding,
}

impl SubtitleDocument {
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Load an SRT file from disk
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let (content, encoding) = decode(&bytes);

        let document = Self::parse(&content, encoding).map_err(|e| match e {
            SubtradError::Load(message) => SubtradError::Load(format!("{}: {}", path.display(), message)),
            other => other,
        })?;

        debug!("Loaded {} cues from {} ({:?})", document.len(), path.display(), encoding);
        Ok(document)
    }

    /// Parse SRT content. Block numbers in the file are ignored and
    /// regenerated on save.
    pub fn parse(content: &str, encoding: SourceEncoding) -> Result<Self> {
        let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
        let mut cues = Vec::new();
        let mut lines = normalized.lines().peekable();

        while lines.peek().is_some() {
            // Skip blank separators between blocks
            while matches!(lines.peek(), Some(line) if line.trim().is_empty()) {
                lines.next();
            }
            let Some(first) = lines.next() else {
                break;
            };

            let timing_line = if first.contains("-->") {
                first
            } else {
                match lines.next() {
                    Some(line) if line.contains("-->") => line,
                    _ => {
                        return Err(SubtradError::Load(format!(
                            "block {} has no timing line (starts with '{}')",
                            cues.len() + 1,
                            first.trim()
                        )));
                    }
                }
            };
            let (start_ms, end_ms) = parse_timing_line(timing_line)?;

            let mut text_lines = Vec::new();
            while let Some(line) = lines.peek() {
                if line.trim().is_empty() {
                    break;
                }
                text_lines.push(line.trim_end().to_string());
                lines.next();
            }

            cues.push(Cue {
                index: cues.len(),
                start_ms,
                end_ms,
                text: text_lines.join("\n"),
            });
        }

        Ok(Self { cues, encoding })
    }

    /// Serialize to SRT
    pub fn to_srt(&self) -> String {
        let mut srt_content = String::new();

        for (index, cue) in self.cues.iter().enumerate() {
            srt_content.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                index + 1,
                format_srt_time(cue.start_ms),
                format_srt_time(cue.end_ms),
                cue.text
            ));
        }

        srt_content
    }

    /// Rewrite the whole document at `output_path`. The content goes to a
    /// sibling file first and is renamed over the target, so a crash never
    /// leaves a half-written output behind.
    pub async fn save<P: AsRef<Path>>(&self, output_path: P) -> Result<()> {
        let output_path = output_path.as_ref();
        write_atomically(output_path, self.to_srt().as_bytes()).await?;
        debug!("Saved {} cues to {}", self.len(), output_path.display());
        Ok(())
    }

    /// Cue texts for `range`, each collapsed to a single line
    pub fn batch_lines(&self, range: std::ops::Range<usize>) -> Vec<String> {
        self.cues[range]
            .iter()
            .map(|cue| collapse_lines(&cue.text))
            .collect()
    }

    /// Write translated lines onto the cues starting at `start`. Returns how
    /// many cues were updated; cues past the end of `lines` keep their text.
    pub fn apply_lines(&mut self, start: usize, count: usize, lines: &[String]) -> usize {
        let end = (start + count).min(self.cues.len());
        let mut applied = 0;

        for (cue, line) in self.cues[start..end].iter_mut().zip(lines) {
            cue.text = line.clone();
            applied += 1;
        }

        applied
    }

    /// Apply `f` to the text of every cue
    pub fn map_text<F: Fn(&str) -> String>(&mut self, f: F) {
        for cue in &mut self.cues {
            cue.text = f(&cue.text);
        }
    }
}

/// Write `content` to a sibling temp file, then rename it onto `path`
pub async fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| SubtradError::Config(format!("Invalid output path: {}", path.display())))?
        .to_string_lossy()
        .to_string();
    let partial = path.with_file_name(format!(".{}.partial", file_name));

    fs::write(&partial, content).await?;
    fs::rename(&partial, path).await?;
    Ok(())
}

fn decode(bytes: &[u8]) -> (String, SourceEncoding) {
    const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

    if let Some(rest) = bytes.strip_prefix(BOM) {
        return (String::from_utf8_lossy(rest).into_owned(), SourceEncoding::Utf8Bom);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), SourceEncoding::Utf8),
        Err(_) => (bytes.iter().map(|&b| b as char).collect(), SourceEncoding::Latin1),
    }
}

fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_timing_line(line: &str) -> Result<(u64, u64)> {
    let mut parts = line.split("-->");
    let start = parts.next().map(str::trim).unwrap_or_default();
    // Anything after the end timestamp (position hints) is dropped
    let end = parts
        .next()
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_default();

    Ok((parse_srt_time(start)?, parse_srt_time(end)?))
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is accepted too)
fn parse_srt_time(value: &str) -> Result<u64> {
    let invalid = || SubtradError::Load(format!("invalid timestamp '{}'", value));

    let (clock, millis) = value
        .split_once(',')
        .or_else(|| value.split_once('.'))
        .ok_or_else(invalid)?;
    let fields: Vec<&str> = clock.split(':').collect();
    if fields.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = fields[0].trim().parse().map_err(|_| invalid())?;
    let minutes: u64 = fields[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = fields[2].parse().map_err(|_| invalid())?;
    let millis: u64 = millis.trim().parse().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(invalid());
    }

    hours
        .checked_mul(3_600_000)
        .and_then(|h| h.checked_add(minutes * 60_000 + seconds * 1_000 + millis))
        .ok_or_else(invalid)
}

/// Format milliseconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\r\n00:00:01,000 --> 00:00:02,500\r\nHello there.\r\n\r\n2\r\n00:00:03,000 --> 00:00:05,000\r\nTwo lines\r\nof text\r\n\r\n";

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0), "00:00:00,000");
        assert_eq!(format_srt_time(65_123), "00:01:05,123");
        assert_eq!(format_srt_time(3_661_500), "01:01:01,500");
    }

    #[test]
    fn test_parse_srt_time() {
        assert_eq!(parse_srt_time("01:01:01,500").unwrap(), 3_661_500);
        assert_eq!(parse_srt_time("00:00:02.250").unwrap(), 2_250);
        assert!(parse_srt_time("00:61:00,000").is_err());
        assert!(parse_srt_time("garbage").is_err());
        assert!(parse_srt_time("99999999999999999:00:00,000").is_err());
    }

    #[test]
    fn test_huge_hour_field_is_a_load_error() {
        let result = SubtitleDocument::parse(
            "1\n99999999999999999:00:00,000 --> 00:00:01,000\nHi\n",
            SourceEncoding::Utf8,
        );
        assert!(matches!(result, Err(SubtradError::Load(_))));
    }

    #[test]
    fn test_parse_keeps_order_and_timing() {
        let document = SubtitleDocument::parse(SAMPLE, SourceEncoding::Utf8).unwrap();

        assert_eq!(document.len(), 2);
        assert_eq!(document.cues[0].index, 0);
        assert_eq!(document.cues[0].start_ms, 1_000);
        assert_eq!(document.cues[0].end_ms, 2_500);
        assert_eq!(document.cues[1].text, "Two lines\nof text");
        assert!(document.to_srt().contains("00:00:03,000 --> 00:00:05,000\nTwo lines\nof text\n"));
    }

    #[test]
    fn test_parse_rejects_block_without_timing() {
        let result = SubtitleDocument::parse("1\nnot a timing line\nHello\n", SourceEncoding::Utf8);
        assert!(matches!(result, Err(SubtradError::Load(_))));
    }

    #[test]
    fn test_batch_lines_collapse_newlines() {
        let document = SubtitleDocument::parse(SAMPLE, SourceEncoding::Utf8).unwrap();
        assert_eq!(document.batch_lines(0..2), vec!["Hello there.", "Two lines of text"]);
    }

    #[test]
    fn test_apply_lines_leaves_missing_cues_untouched() {
        let mut document = SubtitleDocument::parse(SAMPLE, SourceEncoding::Utf8).unwrap();
        let applied = document.apply_lines(0, 2, &["Bonjour.".to_string()]);

        assert_eq!(applied, 1);
        assert_eq!(document.cues[0].text, "Bonjour.");
        assert_eq!(document.cues[1].text, "Two lines\nof text");
        assert_eq!(document.cues[1].start_ms, 3_000);
    }

    #[test]
    fn test_decode_variants() {
        assert_eq!(decode(b"\xEF\xBB\xBFabc"), ("abc".to_string(), SourceEncoding::Utf8Bom));
        assert_eq!(decode(b"abc").1, SourceEncoding::Utf8);
        assert_eq!(decode(b"caf\xE9"), ("café".to_string(), SourceEncoding::Latin1));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.fr.srt");
        let document = SubtitleDocument::parse(SAMPLE, SourceEncoding::Utf8).unwrap();

        document.save(&path).await.unwrap();
        let reloaded = SubtitleDocument::load(&path).await.unwrap();

        assert_eq!(reloaded.cues, document.cues);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
