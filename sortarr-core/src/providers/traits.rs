use async_trait::async_trait;

use crate::media::{Candidate, Episode, MediaType, ProviderId, TitleDetails};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Capability the pipeline needs from a metadata source.
///
/// Implementations return provider-normalized records: callers never see
/// provider wire types.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search for titles matching `query`, optionally restricted to one type
    async fn search(
        &self,
        query: &str,
        kind: Option<MediaType>,
    ) -> Result<Vec<Candidate>, ProviderError>;

    /// Details of a single title
    async fn fetch_details(
        &self,
        id: &ProviderId,
        kind: MediaType,
    ) -> Result<TitleDetails, ProviderError>;

    /// Full episode list of one season of a show
    async fn fetch_season(
        &self,
        show_id: &ProviderId,
        season: u32,
    ) -> Result<Vec<Episode>, ProviderError>;

    /// Get the provider name
    fn name(&self) -> &'static str;
}
