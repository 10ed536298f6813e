use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::gateway::DEFAULT_CALL_TIMEOUT;
use crate::media::MediaKind;
use crate::planner::FileAction;

/// Default video extensions, lower-case and without the leading dot.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts",
];

pub fn default_video_extensions_vec() -> Vec<String> {
    DEFAULT_VIDEO_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// Which files of a batch should be sorted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFilter {
    #[default]
    All,
    Tv,
    Movies,
}

impl MediaFilter {
    /// Unknown-shaped files are admitted so they surface as parse failures
    /// rather than silently disappearing.
    pub fn admits(self, kind: MediaKind) -> bool {
        match (self, kind) {
            (MediaFilter::All, _) | (_, MediaKind::Unknown) => true,
            (MediaFilter::Tv, MediaKind::Episode) => true,
            (MediaFilter::Movies, MediaKind::Movie) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MediaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaFilter::All => write!(f, "movies+tv"),
            MediaFilter::Tv => write!(f, "tv-only"),
            MediaFilter::Movies => write!(f, "movies-only"),
        }
    }
}

/// One sort run, as requested by the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub media_filter: MediaFilter,
    /// Copy instead of move, leaving the source files in place.
    pub keep_originals: bool,
}

impl BatchConfig {
    pub fn new(source_dir: impl AsRef<Path>, destination_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            destination_dir: destination_dir.as_ref().to_path_buf(),
            media_filter: MediaFilter::All,
            keep_originals: false,
        }
    }

    pub fn with_media_filter(mut self, filter: MediaFilter) -> Self {
        self.media_filter = filter;
        self
    }

    pub fn keep_originals(mut self, keep: bool) -> Self {
        self.keep_originals = keep;
        self
    }

    pub fn action(&self) -> FileAction {
        if self.keep_originals {
            FileAction::Copy
        } else {
            FileAction::Move
        }
    }
}

/// Tuning knobs shared by every batch a controller runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Hard bound on every provider call.
    pub call_timeout: Duration,
    /// Number of plausible candidates after which the aggregator stops
    /// issuing shorter fallback queries.
    pub confident_results_target: usize,
    pub video_extensions: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            confident_results_target: 1,
            video_extensions: default_video_extensions_vec(),
        }
    }
}
