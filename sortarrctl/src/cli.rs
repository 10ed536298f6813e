use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sortarr_core::MediaFilter;

use crate::config::SorterSettings;

#[derive(Debug, Parser)]
#[command(
    name = "sortarrctl",
    version,
    about = "Identify loosely named movie and TV files and sort them into a Plex-style library"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Identify every video file below SOURCE and move (or copy) it into DEST
    Sort(SortArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SortArgs {
    /// Directory holding the files to sort
    pub source: PathBuf,

    /// Library root receiving `Movies/` and `TV Shows/`
    pub destination: PathBuf,

    /// Which files to sort
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Copy files instead of moving them
    #[arg(long)]
    pub keep_originals: bool,

    /// Timeout for each metadata request (e.g. 30s, 1m)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Settings file (TOML or JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// TMDB API key
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    pub tmdb_api_key: Option<String>,

    /// TMDB language for titles (e.g. en-US)
    #[arg(long)]
    pub language: Option<String>,
}

impl SortArgs {
    /// Layers the flags given on the command line over `settings`.
    pub fn apply_to(&self, settings: &mut SorterSettings) {
        if let Some(mode) = self.mode {
            settings.mode = mode.into();
        }
        if self.keep_originals {
            settings.keep_originals = true;
        }
        if let Some(timeout) = self.timeout {
            settings.call_timeout = timeout;
        }
        if let Some(language) = &self.language {
            settings.tmdb_language = Some(language.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Movies and TV episodes
    All,
    /// TV episodes only
    Tv,
    /// Movies only
    Movies,
}

impl From<ModeArg> for MediaFilter {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::All => MediaFilter::All,
            ModeArg::Tv => MediaFilter::Tv,
            ModeArg::Movies => MediaFilter::Movies,
        }
    }
}
