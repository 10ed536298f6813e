use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SortError};

/// Shape of a local file as far as its name tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
    Unknown,
}

impl MediaKind {
    /// Provider-side type to search for, if the shape is known.
    pub fn expected_type(self) -> Option<MediaType> {
        match self {
            MediaKind::Movie => Some(MediaType::Movie),
            MediaKind::Episode => Some(MediaType::Tv),
            MediaKind::Unknown => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Episode => write!(f, "episode"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Provider-side media type of a candidate or identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Movie => write!(f, "Movie"),
            MediaType::Tv => write!(f, "TV Series"),
        }
    }
}

/// Identifier assigned by the metadata provider. Unique per provider and
/// [`MediaType`], not across types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ProviderId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Dedup/equality key of a [`Candidate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateKey {
    pub provider_id: ProviderId,
    pub kind: MediaType,
}

/// One search hit, already normalized away from provider wire types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub provider_id: ProviderId,
    pub title: String,
    pub year: Option<u16>,
    pub kind: MediaType,
    /// Provider-native popularity, only used as a final tiebreak.
    pub match_score: f64,
}

impl Candidate {
    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            provider_id: self.provider_id.clone(),
            kind: self.kind,
        }
    }

    /// `Title (Year) - [Kind]`, the label shown to users when picking.
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({}) - [{}]", self.title, year, self.kind),
            None => format!("{} (N/A) - [{}]", self.title, self.kind),
        }
    }
}

/// Details of a single title as returned by `fetch_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleDetails {
    pub provider_id: ProviderId,
    pub kind: MediaType,
    pub title: String,
    pub year: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub number: u32,
    pub title: Option<String>,
}

impl Episode {
    pub fn new(number: u32, title: impl Into<String>) -> Self {
        Self {
            number,
            title: Some(title.into()),
        }
    }
}

/// The full episode list of one season. Can only be built from a non-empty
/// list, so holding one means the season fetch completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonListing {
    season_number: u32,
    episodes: Vec<Episode>,
}

impl SeasonListing {
    pub fn new(season_number: u32, episodes: Vec<Episode>) -> Result<Self> {
        if episodes.is_empty() {
            return Err(SortError::IncompleteMetadata(format!(
                "season {season_number} has no episodes"
            )));
        }

        Ok(Self {
            season_number,
            episodes,
        })
    }

    pub fn season_number(&self) -> u32 {
        self.season_number
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn episode(&self, number: u32) -> Option<&Episode> {
        self.episodes.iter().find(|ep| ep.number == number)
    }

    /// Title of `number`, ignoring blank titles.
    pub fn episode_title(&self, number: u32) -> Option<&str> {
        self.episode(number)
            .and_then(|ep| ep.title.as_deref())
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// A confirmed media identity.
///
/// TV identities either describe the show alone (used for folder aliases) or
/// carry the complete [`SeasonListing`] the file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    kind: MediaType,
    provider_id: ProviderId,
    title: String,
    year: Option<u16>,
    season: Option<SeasonListing>,
}

impl Identity {
    pub fn movie(details: TitleDetails) -> Self {
        Self {
            kind: MediaType::Movie,
            provider_id: details.provider_id,
            title: details.title,
            year: details.year,
            season: None,
        }
    }

    pub fn show(details: TitleDetails) -> Self {
        Self {
            kind: MediaType::Tv,
            provider_id: details.provider_id,
            title: details.title,
            year: details.year,
            season: None,
        }
    }

    pub fn with_season(details: TitleDetails, season: SeasonListing) -> Self {
        Self {
            season: Some(season),
            ..Self::show(details)
        }
    }

    pub fn kind(&self) -> MediaType {
        self.kind
    }

    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn year(&self) -> Option<u16> {
        self.year
    }

    pub fn season(&self) -> Option<&SeasonListing> {
        self.season.as_ref()
    }

    /// Show-level details, dropping any season listing.
    pub fn details(&self) -> TitleDetails {
        TitleDetails {
            provider_id: self.provider_id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            year: self.year,
        }
    }
}
