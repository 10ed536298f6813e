use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SortError};
use crate::job::SortJob;
use crate::media::{Identity, MediaType};

pub const MOVIES_DIR: &str = "Movies";
pub const TV_SHOWS_DIR: &str = "TV Shows";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Move,
    Copy,
}

/// Where one file goes and how it gets there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePlan {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub action: FileAction,
}

/// Computes destinations below a library root. Never touches the disk.
#[derive(Debug, Clone)]
pub struct SortPlanner {
    destination_root: PathBuf,
    action: FileAction,
}

impl SortPlanner {
    pub fn new(destination_root: impl AsRef<Path>, action: FileAction) -> Self {
        Self {
            destination_root: destination_root.as_ref().to_path_buf(),
            action,
        }
    }

    pub fn plan(&self, job: &SortJob) -> Result<FilePlan> {
        let identity = job.identity().ok_or_else(|| {
            SortError::Internal(format!("job {} has no resolved identity", job.id()))
        })?;

        let relative = match identity.kind() {
            MediaType::Movie => self.movie_path(identity, job)?,
            MediaType::Tv => self.episode_path(identity, job)?,
        };
        let destination_path = self.destination_root.join(relative);
        debug!(
            job_id = %job.id(),
            destination = %destination_path.display(),
            "planned destination"
        );

        Ok(FilePlan {
            source_path: job.source_path().to_path_buf(),
            destination_path,
            action: self.action,
        })
    }

    fn movie_path(&self, identity: &Identity, job: &SortJob) -> Result<PathBuf> {
        let year = identity.year().ok_or_else(|| {
            SortError::IncompleteMetadata(format!("no release year for '{}'", identity.title()))
        })?;
        let title = sanitize_component(identity.title());

        Ok(PathBuf::from(MOVIES_DIR)
            .join(year.to_string())
            .join(with_extension(format!("{title} ({year})"), job)))
    }

    fn episode_path(&self, identity: &Identity, job: &SortJob) -> Result<PathBuf> {
        let parsed = job.parsed();
        let (Some(season), Some(episode)) = (parsed.season, parsed.episode) else {
            return Err(SortError::IncompleteMetadata(format!(
                "'{}' has no season/episode marker",
                job.file_name()
            )));
        };

        let listing = identity
            .season()
            .filter(|listing| listing.season_number() == season)
            .ok_or_else(|| {
                SortError::IncompleteMetadata(format!(
                    "no episode listing for season {season} of '{}'",
                    identity.title()
                ))
            })?;

        if listing.episode(episode).is_none() {
            return Err(SortError::IncompleteMetadata(format!(
                "episode {episode} is not listed in season {season} of '{}'",
                identity.title()
            )));
        }
        let episode_title = listing.episode_title(episode).ok_or_else(|| {
            SortError::IncompleteMetadata(format!(
                "episode {episode} of season {season} of '{}' has no title",
                identity.title()
            ))
        })?;

        let width = if listing.len() > 99 { 3 } else { 2 };
        let show = sanitize_component(identity.title());
        let file_stem = format!(
            "S{season:02}E{episode:0width$} - {}",
            sanitize_component(episode_title)
        );

        Ok(PathBuf::from(TV_SHOWS_DIR)
            .join(show)
            .join(format!("Season {season:02}"))
            .join(with_extension(file_stem, job)))
    }
}

fn with_extension(stem: String, job: &SortJob) -> String {
    match job.parsed().extension.as_deref() {
        Some(ext) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem,
    }
}

/// Removes characters that are invalid in file names on common platforms.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !matches!(ch, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned.trim().trim_end_matches('.').trim().to_string()
}
