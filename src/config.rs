//! Resolved console settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Feature options offered by the edit popup when none are configured.
pub const DEFAULT_FEATURES: &[&str] = &["QQMusic", "Tidal", "USB"];

/// Default UI tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// How long a status message stays visible.
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_secs(4);

/// Settings the console runs with, resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tick_rate: Duration,
    pub toast_ttl: Duration,
    /// Values selectable in the `features` field of the edit popup.
    pub feature_options: Vec<String>,
    pub session_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK,
            toast_ttl: DEFAULT_TOAST_TTL,
            feature_options: DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect(),
            session_path: default_session_path(),
        }
    }
}

impl Config {
    pub fn with_tick_rate(mut self, tick_rate: Duration) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = path.into();
        self
    }

    /// Replaces the feature options. An empty list keeps the defaults.
    pub fn with_feature_options(mut self, options: Vec<String>) -> Self {
        if !options.is_empty() {
            self.feature_options = options;
        }
        self
    }
}

/// Splits a comma-separated feature list, dropping blanks and duplicates.
pub fn parse_feature_list(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// `$XDG_CONFIG_HOME/rowdeck/session.json`, else `$HOME/.config/rowdeck/session.json`,
/// else `./rowdeck-session.json`.
pub fn default_session_path() -> PathBuf {
    session_path_from(
        std::env::var_os("XDG_CONFIG_HOME").as_deref().map(Path::new),
        std::env::var_os("HOME").as_deref().map(Path::new),
    )
}

fn session_path_from(xdg_config: Option<&Path>, home: Option<&Path>) -> PathBuf {
    let base = match (xdg_config, home) {
        (Some(xdg), _) if xdg.is_absolute() => xdg.to_path_buf(),
        (_, Some(home)) if !home.as_os_str().is_empty() => home.join(".config"),
        _ => return PathBuf::from("rowdeck-session.json"),
    };
    base.join("rowdeck").join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_path_resolution() {
        assert_eq!(
            session_path_from(Some(Path::new("/xdg")), Some(Path::new("/home/u"))),
            PathBuf::from("/xdg/rowdeck/session.json")
        );
        // Relative XDG paths are ignored.
        assert_eq!(
            session_path_from(Some(Path::new("rel")), Some(Path::new("/home/u"))),
            PathBuf::from("/home/u/.config/rowdeck/session.json")
        );
        assert_eq!(
            session_path_from(None, None),
            PathBuf::from("rowdeck-session.json")
        );
    }

    #[test]
    fn test_parse_feature_list() {
        assert_eq!(
            parse_feature_list(" USB, Tidal,,USB ,Roon"),
            vec!["USB", "Tidal", "Roon"]
        );
        assert!(parse_feature_list(" , ").is_empty());
    }

    #[test]
    fn test_empty_feature_options_keep_defaults() {
        let config = Config::default().with_feature_options(Vec::new());
        assert_eq!(config.feature_options, vec!["QQMusic", "Tidal", "USB"]);
    }
}
