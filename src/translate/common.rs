use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SubtradError};
use crate::matrix::Cell;
use crate::schedule::sleep_interruptible;
use super::TranslationProvider;

/// Instruction sent with every batch
pub const SYSTEM_INSTRUCTION: &str = "You are a professional subtitle translator. \
Translate from English into natural French. \
Output exactly one translated line per input line. \
Do not number the lines.";

/// Attempts per batch before giving up on an empty response
const MAX_ATTEMPTS: usize = 2;

/// Translate one batch with the given cell. An empty or blank response is
/// retried once after `retry_delay`; a second empty response is
/// `EmptyResponse`. Provider errors are returned as-is. A request in flight
/// is abandoned as soon as `interrupt` is cancelled.
pub async fn translate_batch_text(
    provider: &dyn TranslationProvider,
    cell: &Cell<'_>,
    text: &str,
    retry_delay: Duration,
    interrupt: &CancellationToken,
) -> Result<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let response = tokio::select! {
            biased;
            _ = interrupt.cancelled() => return Err(SubtradError::Interrupted),
            response = provider.generate(cell.model, cell.api_key.secret(), SYSTEM_INSTRUCTION, text) => response?,
        };

        if !response.trim().is_empty() {
            debug!("{} answered with {} bytes", cell, response.len());
            return Ok(response);
        }

        if attempt < MAX_ATTEMPTS {
            warn!("  ⚠️ Empty response, retrying in {}s...", retry_delay.as_secs());
            sleep_interruptible(retry_delay, interrupt).await?;
        }
    }

    Err(SubtradError::EmptyResponse)
}

/// Non-blank response lines, trimmed
pub fn split_response_lines(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format duration in seconds to a human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CooldownMatrix;
    use crate::translate::MockTranslationProvider;

    fn matrix() -> CooldownMatrix {
        CooldownMatrix::from_config(&["gemini-test".to_string()], &["secret-1".to_string()])
    }

    #[tokio::test]
    async fn test_first_answer_is_returned() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_generate()
            .withf(|model, key, instruction, text| {
                model == "gemini-test" && key == "secret-1" && instruction == SYSTEM_INSTRUCTION && text == "Hi"
            })
            .times(1)
            .returning(|_, _, _, _| Ok("Salut".to_string()));

        let matrix = matrix();
        let cell = matrix.next_available().unwrap();
        let result = translate_batch_text(&provider, &cell, "Hi", Duration::ZERO, &CancellationToken::new()).await.unwrap();
        assert_eq!(result, "Salut");
    }

    #[tokio::test]
    async fn test_empty_response_is_retried_once() {
        let mut provider = MockTranslationProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok("  \n".to_string()));
        provider
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok("Salut".to_string()));

        let matrix = matrix();
        let cell = matrix.next_available().unwrap();
        let result = translate_batch_text(&provider, &cell, "Hi", Duration::ZERO, &CancellationToken::new()).await.unwrap();
        assert_eq!(result, "Salut");
    }

    #[tokio::test]
    async fn test_two_empty_responses_fail() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_generate()
            .times(2)
            .returning(|_, _, _, _| Ok(String::new()));

        let matrix = matrix();
        let cell = matrix.next_available().unwrap();
        let result = translate_batch_text(&provider, &cell, "Hi", Duration::ZERO, &CancellationToken::new()).await;
        assert!(matches!(result, Err(SubtradError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_generate()
            .times(1)
            .returning(|_, _, _, _| Err(SubtradError::ProviderRateLimited("429".to_string())));

        let matrix = matrix();
        let cell = matrix.next_available().unwrap();
        let result = translate_batch_text(&provider, &cell, "Hi", Duration::ZERO, &CancellationToken::new()).await;
        assert!(matches!(result, Err(SubtradError::ProviderRateLimited(_))));
    }

    #[tokio::test]
    async fn test_cancelled_token_abandons_request() {
        let mut provider = MockTranslationProvider::new();
        provider.expect_generate().times(0);

        let interrupt = CancellationToken::new();
        interrupt.cancel();

        let matrix = matrix();
        let cell = matrix.next_available().unwrap();
        let result = translate_batch_text(&provider, &cell, "Hi", Duration::ZERO, &interrupt).await;
        assert!(matches!(result, Err(SubtradError::Interrupted)));
    }

    #[test]
    fn test_split_response_lines() {
        assert_eq!(split_response_lines("  Un\n\n Deux \r\n\nTrois\n"), vec!["Un", "Deux", "Trois"]);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3 * 3600 + 7 * 60 + 9), "3h 7m");
    }
}
