use std::{fmt, future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

use crate::media::{Candidate, Episode, MediaType, ProviderId, TitleDetails};
use crate::providers::{MetadataProvider, ProviderError};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed failure of a single gateway call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} failed in transport: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: not found")]
    NotFound { operation: &'static str },

    #[error("{operation} returned an unexpected response: {message}")]
    Unexpected {
        operation: &'static str,
        message: String,
    },

    /// The provider refuses to serve this client any more.
    #[error("metadata provider unavailable: {message}")]
    Unavailable { message: String },
}

impl GatewayError {
    fn from_provider(operation: &'static str, err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => GatewayError::NotFound { operation },
            ProviderError::InvalidApiKey => GatewayError::Unavailable {
                message: err.to_string(),
            },
            ProviderError::RateLimited
            | ProviderError::NetworkError(_)
            | ProviderError::Connection(_) => GatewayError::Transport {
                operation,
                message: err.to_string(),
            },
            ProviderError::ApiError(_) | ProviderError::ParseError(_) => {
                GatewayError::Unexpected {
                    operation,
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Timeout-bounded, normalizing front of a [`MetadataProvider`].
///
/// Stateless apart from its configuration. Every call is bounded by the same
/// timeout and nothing is retried.
#[derive(Clone)]
pub struct MetadataGateway {
    provider: Arc<dyn MetadataProvider>,
    call_timeout: Duration,
}

impl fmt::Debug for MetadataGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataGateway")
            .field("provider", &self.provider.name())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl MetadataGateway {
    pub fn new(provider: Arc<dyn MetadataProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub async fn search(
        &self,
        query: &str,
        kind: Option<MediaType>,
    ) -> Result<Vec<Candidate>, GatewayError> {
        let candidates = self
            .bounded("search", self.provider.search(query, kind))
            .await?;

        let total = candidates.len();
        let normalized: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                let title = candidate.title.trim();
                if title.is_empty() {
                    return None;
                }
                candidate.title = title.to_string();
                Some(candidate)
            })
            .collect();

        if normalized.len() != total {
            debug!(
                "Dropped {} blank-titled candidates for '{}'",
                total - normalized.len(),
                query
            );
        }
        Ok(normalized)
    }

    pub async fn fetch_details(
        &self,
        id: &ProviderId,
        kind: MediaType,
    ) -> Result<TitleDetails, GatewayError> {
        let mut details = self
            .bounded("fetch_details", self.provider.fetch_details(id, kind))
            .await?;

        details.title = details.title.trim().to_string();
        if details.title.is_empty() {
            return Err(GatewayError::Unexpected {
                operation: "fetch_details",
                message: format!("{kind} {id} has no title"),
            });
        }
        Ok(details)
    }

    pub async fn fetch_season(
        &self,
        show_id: &ProviderId,
        season: u32,
    ) -> Result<Vec<Episode>, GatewayError> {
        let episodes = self
            .bounded("fetch_season", self.provider.fetch_season(show_id, season))
            .await?;

        Ok(episodes
            .into_iter()
            .map(|episode| Episode {
                number: episode.number,
                title: episode
                    .title
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty()),
            })
            .collect())
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                let err = GatewayError::from_provider(operation, err);
                warn!("{} via {} failed: {}", operation, self.provider.name(), err);
                Err(err)
            }
            Err(_) => {
                warn!(
                    "{} via {} timed out after {:?}",
                    operation,
                    self.provider.name(),
                    self.call_timeout
                );
                Err(GatewayError::Timeout {
                    operation,
                    after: self.call_timeout,
                })
            }
        }
    }
}
