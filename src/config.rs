//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--api`, `--token`, `--no-live`, etc.)
//! 2. `--config <path>`
//! 3. `$PTREE_CONFIG` environment variable (path to config file)
//! 4. Project-local `.ptree.toml` in the current working directory
//! 5. Global `~/.config/ptree/config.toml`
//! 6. Built-in defaults
//!
//! `$PTREE_TOKEN`, when set, replaces the token from any file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

// ── Section configs ──────────────────────────────────────────────────────────

/// Document server connection.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// API root, e.g. `http://localhost:8081/api`.
    pub base_url: Option<String>,
    /// Static token sent with every request.
    pub token: Option<String>,
}

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable mouse support.
    pub mouse: Option<bool>,
    /// Remember expanded directories and focus between sessions.
    pub persist: Option<bool>,
    /// Open the project README when nothing else is selected.
    pub auto_open_readme: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: Option<u64>,
}

/// Live event stream settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LiveConfig {
    /// Subscribe to server push events.
    pub enabled: Option<bool>,
    /// Quiet period used to coalesce bursts of tree events.
    pub refresh_delay_ms: Option<u64>,
    /// Wait before reopening a dropped stream.
    pub reconnect_backoff_ms: Option<u64>,
}

/// Tree panel settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// Use nerd font icons (false = ASCII fallback).
    pub use_icons: Option<bool>,
    /// Extra rows rendered above and below the viewport.
    pub overscan: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<String>,
    /// Filter directive used when `$PTREE_LOG` is unset.
    pub level: Option<String>,
}

/// Color settings for a single theme palette.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ThemeColorsConfig {
    pub tree_fg: Option<String>,
    pub tree_focused_bg: Option<String>,
    pub tree_selected_fg: Option<String>,
    pub tree_dir_fg: Option<String>,
    pub badge_fg: Option<String>,
    pub preview_fg: Option<String>,
    pub status_bg: Option<String>,
    pub status_fg: Option<String>,
    pub border_fg: Option<String>,
}

/// Theme configuration section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ThemeConfig {
    /// Color scheme: "dark", "light", "custom".
    pub scheme: Option<String>,
    /// Custom color overrides.
    pub custom: Option<ThemeColorsConfig>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub general: GeneralConfig,
    pub search: SearchConfig,
    pub live: LiveConfig,
    pub tree: TreeConfig,
    pub logging: LoggingConfig,
    pub theme: ThemeConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081/api";
pub const DEFAULT_TOKEN: &str = "devtoken";
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 200;
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 150;
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 1500;
pub const DEFAULT_OVERSCAN: usize = 1;
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order. `--config` is handled
/// separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("PTREE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".ptree.toml"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("ptree").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            // Logging may not be up yet; say it on stderr too.
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                base_url: other.server.base_url.clone().or(self.server.base_url),
                token: other.server.token.clone().or(self.server.token),
            },
            general: GeneralConfig {
                mouse: other.general.mouse.or(self.general.mouse),
                persist: other.general.persist.or(self.general.persist),
                auto_open_readme: other
                    .general
                    .auto_open_readme
                    .or(self.general.auto_open_readme),
            },
            search: SearchConfig {
                debounce_ms: other.search.debounce_ms.or(self.search.debounce_ms),
            },
            live: LiveConfig {
                enabled: other.live.enabled.or(self.live.enabled),
                refresh_delay_ms: other.live.refresh_delay_ms.or(self.live.refresh_delay_ms),
                reconnect_backoff_ms: other
                    .live
                    .reconnect_backoff_ms
                    .or(self.live.reconnect_backoff_ms),
            },
            tree: TreeConfig {
                use_icons: other.tree.use_icons.or(self.tree.use_icons),
                overscan: other.tree.overscan.or(self.tree.overscan),
            },
            logging: LoggingConfig {
                file: other.logging.file.clone().or(self.logging.file),
                level: other.logging.level.clone().or(self.logging.level),
            },
            theme: ThemeConfig {
                scheme: other.theme.scheme.clone().or(self.theme.scheme),
                custom: other.theme.custom.clone().or(self.theme.custom),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so later merges win.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Ok(token) = std::env::var("PTREE_TOKEN") {
            if !token.is_empty() {
                config.server.token = Some(token);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn base_url(&self) -> &str {
        self.server.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn token(&self) -> &str {
        self.server.token.as_deref().unwrap_or(DEFAULT_TOKEN)
    }

    /// Whether mouse support is enabled.
    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(true)
    }

    /// Whether navigation state is written to session storage.
    pub fn persist(&self) -> bool {
        self.general.persist.unwrap_or(true)
    }

    pub fn auto_open_readme(&self) -> bool {
        self.general.auto_open_readme.unwrap_or(true)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms.unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS))
    }

    /// Whether the live event stream is used.
    pub fn live_enabled(&self) -> bool {
        self.live.enabled.unwrap_or(true)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.live.refresh_delay_ms.unwrap_or(DEFAULT_REFRESH_DELAY_MS))
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(
            self.live
                .reconnect_backoff_ms
                .unwrap_or(DEFAULT_RECONNECT_BACKOFF_MS),
        )
    }

    /// Whether to use nerd font icons.
    pub fn use_icons(&self) -> bool {
        self.tree.use_icons.unwrap_or(true)
    }

    pub fn overscan(&self) -> usize {
        self.tree.overscan.unwrap_or(DEFAULT_OVERSCAN)
    }

    /// Log file path; defaults to `<cache_dir>/ptree/ptree.log`.
    pub fn log_file(&self) -> PathBuf {
        match &self.logging.file {
            Some(file) => PathBuf::from(file),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ptree")
                .join("ptree.log"),
        }
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.base_url(), "http://localhost:8081/api");
        assert_eq!(cfg.token(), "devtoken");
        assert!(cfg.mouse_enabled());
        assert!(cfg.persist());
        assert!(cfg.auto_open_readme());
        assert_eq!(cfg.search_debounce(), Duration::from_millis(200));
        assert!(cfg.live_enabled());
        assert_eq!(cfg.refresh_delay(), Duration::from_millis(150));
        assert_eq!(cfg.reconnect_backoff(), Duration::from_millis(1500));
        assert!(cfg.use_icons());
        assert_eq!(cfg.overscan(), 1);
        assert_eq!(cfg.log_level(), "info");
        assert!(cfg.log_file().ends_with("ptree/ptree.log"));
        assert_eq!(cfg.theme.scheme, None);
    }

    #[test]
    fn test_toml_parsing_full() {
        let toml = r#"
[server]
base_url = "https://docs.example.com/api"
token = "s3cret"

[general]
mouse = false
persist = false
auto_open_readme = false

[search]
debounce_ms = 350

[live]
enabled = false
refresh_delay_ms = 400
reconnect_backoff_ms = 5000

[tree]
use_icons = false
overscan = 4

[logging]
file = "/tmp/ptree-test.log"
level = "debug"

[theme]
scheme = "light"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(cfg.base_url(), "https://docs.example.com/api");
        assert_eq!(cfg.token(), "s3cret");
        assert!(!cfg.mouse_enabled());
        assert!(!cfg.persist());
        assert!(!cfg.auto_open_readme());
        assert_eq!(cfg.search_debounce(), Duration::from_millis(350));
        assert!(!cfg.live_enabled());
        assert_eq!(cfg.refresh_delay(), Duration::from_millis(400));
        assert_eq!(cfg.reconnect_backoff(), Duration::from_secs(5));
        assert!(!cfg.use_icons());
        assert_eq!(cfg.overscan(), 4);
        assert_eq!(cfg.log_file(), PathBuf::from("/tmp/ptree-test.log"));
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.theme.scheme.as_deref(), Some("light"));
    }

    #[test]
    fn test_toml_parsing_partial() {
        let cfg: AppConfig = toml::from_str("[live]\nenabled = false\n").expect("parse failed");
        assert!(!cfg.live_enabled());
        // Everything else should be defaults
        assert_eq!(cfg.refresh_delay(), Duration::from_millis(150));
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_toml_parsing_empty() {
        let cfg: AppConfig = toml::from_str("").expect("parse failed");
        assert!(cfg.persist());
        assert_eq!(cfg.overscan(), DEFAULT_OVERSCAN);
    }

    #[test]
    fn test_merge_overrides() {
        let base = AppConfig {
            server: ServerConfig {
                base_url: Some("http://a/api".into()),
                token: Some("base".into()),
            },
            search: SearchConfig {
                debounce_ms: Some(100),
            },
            ..Default::default()
        };
        let over = AppConfig {
            server: ServerConfig {
                token: Some("over".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = base.merge(&over);
        assert_eq!(merged.token(), "over");
        assert_eq!(merged.base_url(), "http://a/api");
        assert_eq!(merged.search_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn test_merge_none_does_not_clear_some() {
        let base = AppConfig {
            live: LiveConfig {
                enabled: Some(false),
                refresh_delay_ms: Some(500),
                reconnect_backoff_ms: None,
            },
            ..Default::default()
        };
        let merged = base.merge(&AppConfig::default());
        assert!(!merged.live_enabled());
        assert_eq!(merged.refresh_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("test-config.toml");
        let mut f = std::fs::File::create(&cfg_path).expect("create");
        writeln!(
            f,
            r#"
[server]
base_url = "http://files.local/api"

[tree]
overscan = 3
"#
        )
        .expect("write");

        let cfg = load_file(&cfg_path).expect("load");
        assert_eq!(cfg.base_url(), "http://files.local/api");
        assert_eq!(cfg.overscan(), 3);
        assert!(cfg.use_icons());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_file(Path::new("/nonexistent/config.toml")).is_none());
    }

    #[test]
    fn test_load_invalid_toml_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("bad.toml");
        std::fs::write(&cfg_path, "this is { not valid toml").expect("write");
        assert!(load_file(&cfg_path).is_none());
    }

    #[test]
    fn test_load_with_cli_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("config.toml");
        std::fs::write(
            &cfg_path,
            r#"
[server]
base_url = "http://from-file/api"

[general]
mouse = false
"#,
        )
        .expect("write");

        let cli_overrides = AppConfig {
            server: ServerConfig {
                base_url: Some("http://from-cli/api".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = AppConfig::load(Some(&cfg_path), Some(&cli_overrides));
        assert_eq!(cfg.base_url(), "http://from-cli/api");
        assert!(!cfg.mouse_enabled());
    }
}
