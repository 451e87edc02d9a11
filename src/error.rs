use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtradError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No English subtitle source found for {0}")]
    SourceMissing(String),

    #[error("Unsupported subtitle format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to load subtitle document: {0}")]
    Load(String),

    #[error("Provider rate limited the request: {0}")]
    ProviderRateLimited(String),

    #[error("Provider quota exceeded: {0}")]
    ProviderQuotaExceeded(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Empty response after 2 attempts")]
    EmptyResponse,

    #[error("All credentials are cooling down")]
    AllCredentialsExhausted,

    #[error("Subtitle converter error: {0}")]
    Converter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Interrupted by signal")]
    Interrupted,
}

impl SubtradError {
    /// Classify a raw provider failure message.
    ///
    /// The provider reports quota and rate limiting only through its message
    /// text, so this matches known substrings.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("quota") || lower.contains("resource_exhausted") {
            Self::ProviderQuotaExceeded(message)
        } else if lower.contains("429") || lower.contains("rate") {
            Self::ProviderRateLimited(message)
        } else {
            Self::Provider(message)
        }
    }

    /// Failures that put a credential cell into cooldown
    pub fn is_rate_limit_class(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimited(_) | Self::ProviderQuotaExceeded(_) | Self::EmptyResponse
        )
    }
}

pub type Result<T> = std::result::Result<T, SubtradError>;
