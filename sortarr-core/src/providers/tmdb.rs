use std::fmt;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{MetadataProvider, ProviderError};
use crate::media::{Candidate, Episode, MediaType, ProviderId, TitleDetails};

const TMDB_V3_BASE: &str = "https://api.themoviedb.org/3";

/// TMDB v3 adapter. All TMDB field quirks (`title` vs `name`,
/// `release_date` vs `first_air_date`) are resolved here.
pub struct TmdbProvider {
    http: Client,
    api_key: String,
    base_url: String,
    language: Option<String>,
}

impl fmt::Debug for TmdbProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbProvider")
            .field("base_url", &self.base_url)
            .field("language", &self.language)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl TmdbProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url: TMDB_V3_BASE.to_string(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|lang| !lang.trim().is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_tmdb_json<Q, T>(&self, url: &str, query: &Q) -> Result<T, ProviderError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.get(url).query(query).send().await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body)
                .map_err(|err| ProviderError::ParseError(err.to_string()));
        }

        #[derive(Debug, Deserialize)]
        struct TmdbErrorBody {
            #[serde(default)]
            status_message: Option<String>,
        }

        let message = response
            .json::<TmdbErrorBody>()
            .await
            .ok()
            .and_then(|body| body.status_message)
            .unwrap_or_else(|| format!("TMDB request failed with status {}", status));

        match status.as_u16() {
            401 => Err(ProviderError::InvalidApiKey),
            404 => Err(ProviderError::NotFound),
            429 => Err(ProviderError::RateLimited),
            _ => Err(ProviderError::ApiError(message)),
        }
    }

    fn params(&self) -> BaseParams<'_> {
        BaseParams {
            api_key: &self.api_key,
            language: self.language.as_deref(),
        }
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    async fn search(
        &self,
        query: &str,
        kind: Option<MediaType>,
    ) -> Result<Vec<Candidate>, ProviderError> {
        let endpoint = match kind {
            Some(MediaType::Movie) => "search/movie",
            Some(MediaType::Tv) => "search/tv",
            None => "search/multi",
        };
        let params = SearchParams {
            base: self.params(),
            query,
            include_adult: false,
        };

        let response: TmdbSearchResponse = self
            .get_tmdb_json(&format!("{}/{endpoint}", self.base_url), &params)
            .await?;
        debug!(
            "TMDB {} for '{}' returned {} results",
            endpoint,
            query,
            response.results.len()
        );

        Ok(response
            .results
            .into_iter()
            .filter_map(|result| result.into_candidate(kind))
            .collect())
    }

    async fn fetch_details(
        &self,
        id: &ProviderId,
        kind: MediaType,
    ) -> Result<TitleDetails, ProviderError> {
        match kind {
            MediaType::Movie => {
                let details: TmdbMovieDetails = self
                    .get_tmdb_json(&format!("{}/movie/{id}", self.base_url), &self.params())
                    .await?;
                Ok(TitleDetails {
                    provider_id: ProviderId::from(details.id),
                    kind,
                    title: details.title,
                    year: parse_year(details.release_date.as_deref()),
                })
            }
            MediaType::Tv => {
                let details: TmdbTvDetails = self
                    .get_tmdb_json(&format!("{}/tv/{id}", self.base_url), &self.params())
                    .await?;
                Ok(TitleDetails {
                    provider_id: ProviderId::from(details.id),
                    kind,
                    title: details.name,
                    year: parse_year(details.first_air_date.as_deref()),
                })
            }
        }
    }

    async fn fetch_season(
        &self,
        show_id: &ProviderId,
        season: u32,
    ) -> Result<Vec<Episode>, ProviderError> {
        let details: TmdbSeasonDetails = self
            .get_tmdb_json(
                &format!("{}/tv/{show_id}/season/{season}", self.base_url),
                &self.params(),
            )
            .await?;

        Ok(details
            .episodes
            .into_iter()
            .map(|episode| Episode {
                number: episode.episode_number,
                title: episode.name,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

#[derive(Debug, Serialize)]
struct BaseParams<'a> {
    api_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SearchParams<'a> {
    #[serde(flatten)]
    base: BaseParams<'a>,
    query: &'a str,
    include_adult: bool,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResult {
    id: u64,
    title: Option<String>,
    name: Option<String>, // TV shows use "name" instead of "title"
    release_date: Option<String>,
    first_air_date: Option<String>,
    // Only present on search/multi
    media_type: Option<String>,
    popularity: Option<f64>,
}

impl TmdbSearchResult {
    fn into_candidate(self, requested: Option<MediaType>) -> Option<Candidate> {
        let kind = match (requested, self.media_type.as_deref()) {
            (Some(kind), _) => kind,
            (None, Some("movie")) => MediaType::Movie,
            (None, Some("tv")) => MediaType::Tv,
            // people and unlabeled multi results
            (None, _) => return None,
        };

        let (title, date) = match kind {
            MediaType::Movie => (self.title.or(self.name), self.release_date),
            MediaType::Tv => (self.name.or(self.title), self.first_air_date),
        };

        Some(Candidate {
            provider_id: ProviderId::from(self.id),
            title: title.unwrap_or_default(),
            year: parse_year(date.as_deref()),
            kind,
            match_score: self.popularity.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetails {
    id: u64,
    title: String,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetails {
    id: u64,
    name: String,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonDetails {
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    episode_number: u32,
    name: Option<String>,
}

fn parse_year(date: Option<&str>) -> Option<u16> {
    let date = date?.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|parsed| u16::try_from(parsed.year()).ok())
}
