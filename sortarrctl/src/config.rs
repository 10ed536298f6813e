use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sortarr_core::{MediaFilter, PipelineSettings};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {origin}: {message}")]
    Parse { origin: String, message: String },
}

/// Source that produced the sorter settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SettingsSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Persistent sorter settings. Command-line flags override these per run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SorterSettings {
    /// Which files to sort: `all`, `tv` or `movies`.
    pub mode: MediaFilter,
    /// Copy instead of move.
    pub keep_originals: bool,
    /// Upper bound for every metadata request, as a humantime string
    /// (`"30s"`, `"1m"`).
    #[serde(with = "humantime_duration")]
    pub call_timeout: Duration,
    /// Plausible matches after which shorter fallback searches are skipped.
    pub confident_results_target: usize,
    pub video_extensions: Vec<String>,
    /// TMDB language for titles, e.g. `en-US`.
    pub tmdb_language: Option<String>,
}

impl Default for SorterSettings {
    fn default() -> Self {
        let pipeline = PipelineSettings::default();
        Self {
            mode: MediaFilter::All,
            keep_originals: false,
            call_timeout: pipeline.call_timeout,
            confident_results_target: pipeline.confident_results_target,
            video_extensions: pipeline.video_extensions,
            tmdb_language: None,
        }
    }
}

impl SorterSettings {
    /// Load settings overrides using environment variables.
    /// Evaluation order:
    /// 1) `$SORTARR_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$SORTARR_CONFIG_JSON` (inline JSON),
    /// 3) the first existing default file in the working directory,
    /// 4) defaults.
    pub fn load_from_env() -> Result<(Self, SettingsSource), ConfigLoadError> {
        Self::load_with(|key| env::var(key).ok(), Path::new("."))
    }

    pub fn load_with<F>(var: F, base_dir: &Path) -> Result<(Self, SettingsSource), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path_str) = var("SORTARR_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let settings = Self::load_from_file(&path)?;
            return Ok((settings, SettingsSource::EnvPath(path)));
        }

        if let Some(raw) = var("SORTARR_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let settings = Self::parse_json(&raw)?;
            return Ok((settings, SettingsSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file(base_dir) {
            let settings = Self::load_from_file(&path)?;
            return Ok((settings, SettingsSource::File(path)));
        }

        Ok((Self::default(), SettingsSource::Default))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                origin,
                message: err.to_string(),
            }),
            Some("toml") => toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                origin,
                message: err.to_string(),
            }),
            _ => Self::parse_from_str(&contents, &origin),
        }
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        // Try TOML first, then JSON for convenience.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| ConfigLoadError::Parse {
                origin: origin.to_string(),
                message: format!("toml error: {toml_err}; json error: {json_err}"),
            })
        })
    }

    pub fn parse_json(raw: &str) -> Result<Self, ConfigLoadError> {
        serde_json::from_str(raw).map_err(|err| ConfigLoadError::Parse {
            origin: "SORTARR_CONFIG_JSON".to_string(),
            message: err.to_string(),
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            call_timeout: self.call_timeout,
            confident_results_target: self.confident_results_target.max(1),
            video_extensions: self.video_extensions.clone(),
        }
    }

    fn find_default_file(base_dir: &Path) -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &["sortarr.toml", "sortarr.json", "config/sortarr.toml"];

        CANDIDATES
            .iter()
            .map(|candidate| base_dir.join(candidate))
            .find(|path| path.exists())
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sortarr.toml");
        fs::write(
            &path,
            "mode = \"tv\"\nkeep_originals = true\ncall_timeout = \"45s\"\n",
        )
        .unwrap();

        let (settings, source) = SorterSettings::load_with(vars(&[]), dir.path()).unwrap();

        assert_eq!(source, SettingsSource::File(path));
        assert_eq!(settings.mode, MediaFilter::Tv);
        assert!(settings.keep_originals);
        assert_eq!(settings.call_timeout, Duration::from_secs(45));
        assert_eq!(settings.confident_results_target, 1);
    }

    #[test]
    fn env_path_wins_over_inline_json_and_default_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sortarr.toml"), "mode = \"tv\"\n").unwrap();
        let explicit = dir.path().join("custom.json");
        fs::write(&explicit, r#"{"mode":"movies"}"#).unwrap();
        let explicit_str = explicit.display().to_string();

        let (settings, source) = SorterSettings::load_with(
            vars(&[
                ("SORTARR_CONFIG_PATH", explicit_str.as_str()),
                ("SORTARR_CONFIG_JSON", r#"{"mode":"tv"}"#),
            ]),
            dir.path(),
        )
        .unwrap();

        assert_eq!(source, SettingsSource::EnvPath(explicit));
        assert_eq!(settings.mode, MediaFilter::Movies);
    }

    #[test]
    fn inline_json_is_used_without_a_path() {
        let dir = TempDir::new().unwrap();
        let (settings, source) = SorterSettings::load_with(
            vars(&[("SORTARR_CONFIG_JSON", r#"{"call_timeout":"2m","tmdb_language":"de-DE"}"#)]),
            dir.path(),
        )
        .unwrap();

        assert_eq!(source, SettingsSource::EnvInline);
        assert_eq!(settings.call_timeout, Duration::from_secs(120));
        assert_eq!(settings.tmdb_language.as_deref(), Some("de-DE"));
    }

    #[test]
    fn defaults_when_nothing_is_configured() {
        let dir = TempDir::new().unwrap();
        let (settings, source) = SorterSettings::load_with(vars(&[]), dir.path()).unwrap();
        assert_eq!(source, SettingsSource::Default);
        assert_eq!(settings, SorterSettings::default());
        assert_eq!(settings.pipeline_settings(), PipelineSettings::default());
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        let err = SorterSettings::parse_from_str("call_timeout = \"soon\"", "inline").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }
}
