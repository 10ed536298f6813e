use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::media::MediaKind;

static EPISODE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(s(\d{1,2})e(\d{1,3}))(?:[^0-9]|$)")
        .expect("episode marker regex")
});

static BRACKET_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("bracket tag regex"));

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year regex"));

// Everything from the first quality/edition token onwards is release noise,
// including a trailing `-GROUP`.
static QUALITY_CUTOFF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:2160p|1080p|1080i|720p|576p|480p|360p|4k|uhd|bluray|blu-ray|bdrip|brrip|webrip|web-dl|webdl|hdtv|sdtv|dvdrip|hdrip|hdcam|xvid|divx|x264|x265|h264|h265|hevc|10bit|hdr10|hdr|remux|aac|ac3|dts|flac|proper|repack|unrated|extended|remastered|uncut|theatrical|director'?s\s*cut)\b",
    )
    .expect("quality cutoff regex")
});

static PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^()]*\)").expect("parens regex"));

static SEASON_FOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:season|series)\s*\d+|s\d{1,2}|specials?)$").expect("season folder regex")
});

static FOLDER_TITLE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\(((?:19|20)\d{2})\)\s*$").expect("folder title regex"));

/// What a file name (and its folders) suggests about the media inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFilename {
    pub raw_name: String,
    pub guessed_title: String,
    pub guessed_year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub kind: MediaKind,
    pub extension: Option<String>,
    /// Nearest ancestor that is not a season folder, set only when the show
    /// title was taken from it because the file name carries none.
    pub show_folder: Option<PathBuf>,
}

impl ParsedFilename {
    pub fn has_title(&self) -> bool {
        has_title_chars(&self.guessed_title)
    }
}

/// Pure filename parser. Never fails: names without a usable title come back
/// as [`MediaKind::Unknown`].
#[derive(Debug, Clone, Default)]
pub struct FilenameParser {
    source_root: Option<PathBuf>,
}

impl FilenameParser {
    pub fn new() -> Self {
        Self { source_root: None }
    }

    /// Folder walks never climb to or above `root`.
    pub fn with_source_root(root: impl AsRef<Path>) -> Self {
        Self {
            source_root: Some(root.as_ref().to_path_buf()),
        }
    }

    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ParsedFilename {
        let file_path = file_path.as_ref();
        let raw_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = file_path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned());

        let parsed = match EPISODE_MARKER.captures(&stem) {
            Some(captures) => {
                let marker_start = captures.get(1).map(|m| m.start()).unwrap_or(0);
                let season = captures.get(2).and_then(|m| m.as_str().parse().ok());
                let episode = captures.get(3).and_then(|m| m.as_str().parse().ok());
                self.parse_episode(file_path, &stem[..marker_start], season, episode)
            }
            None => self.parse_movie(file_path, &stem),
        };

        let parsed = ParsedFilename {
            raw_name,
            extension,
            ..parsed
        };
        debug!(
            "Parsed '{}' as {} '{}' (year {:?}, S{:?}E{:?})",
            parsed.raw_name,
            parsed.kind,
            parsed.guessed_title,
            parsed.guessed_year,
            parsed.season,
            parsed.episode
        );
        parsed
    }

    fn parse_episode(
        &self,
        file_path: &Path,
        prefix: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> ParsedFilename {
        let (mut title, mut year) = clean_title(prefix);
        let mut show_folder = None;

        // Only a folder that names the show may stand in for it.
        if !has_title_chars(&title)
            && let Some(folder) = self.show_folder(file_path)
            && let Some(folder_name) = folder.file_name().and_then(|name| name.to_str())
        {
            let (folder_title, folder_year) = clean_title(folder_name);
            title = folder_title;
            year = year.or(folder_year);
            show_folder = Some(folder);
        }

        let kind = if has_title_chars(&title) && season.is_some() && episode.is_some() {
            MediaKind::Episode
        } else {
            MediaKind::Unknown
        };

        ParsedFilename {
            raw_name: String::new(),
            guessed_title: title,
            guessed_year: year,
            season,
            episode,
            kind,
            extension: None,
            show_folder,
        }
    }

    fn parse_movie(&self, file_path: &Path, stem: &str) -> ParsedFilename {
        let (mut title, mut year) = clean_title(stem);

        if !has_title_chars(&title)
            && let Some(folder_name) = file_path
                .parent()
                .filter(|parent| !self.is_source_root(parent))
                .and_then(Path::file_name)
                .and_then(|name| name.to_str())
        {
            debug!("Falling back to folder name '{}' for movie title", folder_name);
            (title, year) = parse_movie_folder(folder_name);
        }

        let kind = if has_title_chars(&title) {
            MediaKind::Movie
        } else {
            MediaKind::Unknown
        };

        ParsedFilename {
            raw_name: String::new(),
            guessed_title: title,
            guessed_year: year,
            season: None,
            episode: None,
            kind,
            extension: None,
            show_folder: None,
        }
    }

    fn show_folder(&self, file_path: &Path) -> Option<PathBuf> {
        let mut current = file_path.parent()?;
        loop {
            if self.is_source_root(current) {
                return None;
            }
            let name = current.file_name()?.to_str()?;
            if !SEASON_FOLDER.is_match(name.trim()) {
                return Some(current.to_path_buf());
            }
            current = current.parent()?;
        }
    }

    fn is_source_root(&self, dir: &Path) -> bool {
        self.source_root.as_deref().is_some_and(|root| root == dir)
    }
}

fn parse_movie_folder(folder_name: &str) -> (String, Option<u16>) {
    if let Some(captures) = FOLDER_TITLE_YEAR.captures(folder_name)
        && let (Some(title), Some(year)) = (captures.get(1), captures.get(2))
    {
        return (finish_title(title.as_str()), year.as_str().parse().ok());
    }
    clean_title(folder_name)
}

/// Strips tags, quality noise and the release year from a name fragment.
fn clean_title(raw: &str) -> (String, Option<u16>) {
    let mut text = BRACKET_TAG.replace_all(raw, " ").into_owned();
    text = text.replace(['.', '_'], " ");

    if let Some(noise) = QUALITY_CUTOFF.find(&text) {
        text.truncate(noise.start());
    }

    let (text, year) = split_year(&text);
    (finish_title(text), year)
}

/// Picks the last year token that still leaves a title in front of it, so
/// `1917 (2019)` keeps `1917` as the title.
fn split_year(text: &str) -> (&str, Option<u16>) {
    let years: Vec<_> = YEAR.find_iter(text).collect();
    for year in years.iter().rev() {
        let before = &text[..year.start()];
        if has_title_chars(&strip_parens(before)) {
            return (before, year.as_str().parse().ok());
        }
    }
    (text, None)
}

fn strip_parens(text: &str) -> String {
    let mut cleaned = text.to_string();
    loop {
        let next = PARENS.replace_all(&cleaned, " ").into_owned();
        if next == cleaned {
            break;
        }
        cleaned = next;
    }
    cleaned.replace(['(', ')'], " ")
}

fn finish_title(text: &str) -> String {
    let cleaned = collapse_whitespace(&strip_parens(text));
    cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '_' || c == '.' || c == ',')
        .to_string()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_title_chars(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
