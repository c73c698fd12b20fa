//! Ambient settings loader plus the directive dispatcher that feeds
//! `ignore-article`/`always-download`/`reset-unread-on-update`/`define-filter`
//! lines into the Ignores/Filters components.
//!
//! The config file's own tokenizer (arbitrary `key value...` lines, `set`,
//! colors, key bindings) is an out-of-scope external collaborator; what we
//! own is the typed settings struct below plus the action handlers for the
//! directives the core consumes (spec §6).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::filters::FilterContainer;
use crate::ignores::{IgnoreConfigError, Ignores};
use crate::model::{SortDirection, SortMethod, SortStrategy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file too large: {0}")]
    TooLarge(String),
}

#[derive(Debug, Error)]
pub enum ConfigActionError {
    #[error("directive `{0}` requires at least {1} parameter(s)")]
    WrongParameterCount(String, usize),
    #[error("unrecognized article-sort-order method `{0}`")]
    UnknownSortMethod(String),
    #[error(transparent)]
    Ignore(#[from] IgnoreConfigError),
}

/// A TOML-native `ignore-article <selector> <expr>` entry.
#[derive(Clone, Deserialize)]
pub struct IgnoreRuleConfig {
    pub selector: String,
    pub expr: String,
}

/// A TOML-native `define-filter <name> <expr>` entry.
#[derive(Clone, Deserialize)]
pub struct FilterConfig {
    pub name: String,
    pub expr: String,
}

/// Ambient settings (the non-directive subset of the config-file surface),
/// plus the directives themselves expressed as typed TOML arrays rather
/// than the line-oriented `ignore-article`/`define-filter` syntax (whose
/// tokenizer is the out-of-scope collaborator described above).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auto_reload: bool,
    pub reload_time_minutes: u64,
    pub reload_threads: usize,
    pub download_path: String,
    pub download_filename_format: String,
    pub max_items: i64,
    pub show_read_articles: bool,
    pub notify_program: Option<String>,
    pub pre_reload_hook: Option<String>,
    pub post_reload_hook: Option<String>,
    pub delete_read_articles_on_quit: bool,
    pub cleanup_on_quit: bool,
    pub ignore_rules: Vec<IgnoreRuleConfig>,
    pub always_download: Vec<String>,
    pub reset_unread_on_update: Vec<String>,
    pub filters: Vec<FilterConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_reload: false,
            reload_time_minutes: 60,
            reload_threads: 4,
            download_path: "~/Podcasts/".to_string(),
            download_filename_format: "%n/%t.%e".to_string(),
            max_items: 0,
            show_read_articles: true,
            notify_program: None,
            pre_reload_hook: None,
            post_reload_hook: None,
            delete_read_articles_on_quit: false,
            cleanup_on_quit: false,
            ignore_rules: Vec::new(),
            always_download: Vec::new(),
            reset_unread_on_update: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("auto_reload", &self.auto_reload)
            .field("reload_time_minutes", &self.reload_time_minutes)
            .field("reload_threads", &self.reload_threads)
            .field("download_path", &self.download_path)
            .field("download_filename_format", &self.download_filename_format)
            .field("max_items", &self.max_items)
            .field("show_read_articles", &self.show_read_articles)
            .finish_non_exhaustive()
    }
}

impl Settings {
    const MAX_FILE_SIZE: u64 = 1_048_576;
    const KNOWN_KEYS: &'static [&'static str] = &[
        "auto_reload",
        "reload_time_minutes",
        "reload_threads",
        "download_path",
        "download_filename_format",
        "max_items",
        "show_read_articles",
        "notify_program",
        "pre_reload_hook",
        "post_reload_hook",
        "delete_read_articles_on_quit",
        "cleanup_on_quit",
        "ignore_rules",
        "always_download",
        "reset_unread_on_update",
        "filters",
    ];

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "unknown key in config file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }
}

/// A single parsed `define-filter`/`ignore-article`/etc. line, already split
/// into its directive name and parameters.
pub struct ConfigAction<'a> {
    pub name: &'a str,
    pub params: Vec<&'a str>,
}

/// Dispatches the directives the core subsystems consume, grounded on the
/// `ConfigActionHandler` pattern: every handler either mutates its
/// component or returns a `ConfigActionError` that aborts config load.
pub trait ConfigActionHandler {
    fn handle_action(&mut self, action: &ConfigAction) -> Result<(), ConfigActionError>;
}

/// Routes `ignore-article`, `always-download`, and `reset-unread-on-update`
/// into an `Ignores` instance.
pub struct IgnoresActionHandler<'a> {
    pub ignores: &'a mut Ignores,
}

impl ConfigActionHandler for IgnoresActionHandler<'_> {
    fn handle_action(&mut self, action: &ConfigAction) -> Result<(), ConfigActionError> {
        match action.name {
            "ignore-article" => {
                if action.params.len() < 2 {
                    return Err(ConfigActionError::WrongParameterCount(
                        action.name.to_string(),
                        2,
                    ));
                }
                self.ignores
                    .add_ignore_rule(action.params[0], &action.params[1..].join(" "))?;
                Ok(())
            }
            "always-download" => {
                if action.params.is_empty() {
                    return Err(ConfigActionError::WrongParameterCount(
                        action.name.to_string(),
                        1,
                    ));
                }
                for url in &action.params {
                    self.ignores.add_always_download(url);
                }
                Ok(())
            }
            "reset-unread-on-update" => {
                if action.params.is_empty() {
                    return Err(ConfigActionError::WrongParameterCount(
                        action.name.to_string(),
                        1,
                    ));
                }
                for url in &action.params {
                    self.ignores.add_reset_unread_on_update(url);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Routes `define-filter` into a `FilterContainer`.
pub struct FiltersActionHandler<'a> {
    pub filters: &'a mut FilterContainer,
}

impl ConfigActionHandler for FiltersActionHandler<'_> {
    fn handle_action(&mut self, action: &ConfigAction) -> Result<(), ConfigActionError> {
        if action.name != "define-filter" {
            return Ok(());
        }
        if action.params.len() < 2 {
            return Err(ConfigActionError::WrongParameterCount(
                action.name.to_string(),
                2,
            ));
        }
        self.filters
            .add(action.params[0], action.params[1..].join(" "));
        Ok(())
    }
}

pub fn parse_sort_order(spec: &str) -> Result<SortStrategy, ConfigActionError> {
    let mut parts = spec.splitn(2, '-');
    let method_str = parts.next().unwrap_or("date");
    let dir_str = parts.next();

    let method = match method_str {
        "date" => SortMethod::Date,
        "title" => SortMethod::Title,
        "flags" => SortMethod::Flags,
        "author" => SortMethod::Author,
        "link" => SortMethod::Link,
        "guid" => SortMethod::Guid,
        "random" => SortMethod::Random,
        other => return Err(ConfigActionError::UnknownSortMethod(other.to_string())),
    };
    let direction = match dir_str {
        Some("asc") => SortDirection::Asc,
        _ => SortDirection::Desc,
    };
    Ok(SortStrategy::new(method, direction))
}

/// Convenience entry point: splits `lines` on whitespace (outside quotes is
/// out of scope; callers pre-tokenize) and dispatches each through every
/// handler in order, collecting the first error.
pub fn apply_directives(
    actions: &[ConfigAction],
    handlers: &mut [&mut dyn ConfigActionHandler],
) -> Result<(), ConfigActionError> {
    for action in actions {
        for handler in handlers.iter_mut() {
            handler.handle_action(action)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_file_missing() {
        let settings = Settings::load(Path::new("/nonexistent/feedspar.toml")).unwrap();
        assert_eq!(settings.reload_threads, 4);
    }

    #[test]
    fn ignore_article_directive_routes_into_ignores() {
        let mut ignores = Ignores::new();
        let mut handler = IgnoresActionHandler {
            ignores: &mut ignores,
        };
        let action = ConfigAction {
            name: "ignore-article",
            params: vec!["*", "author", "=", "\"Spam\""],
        };
        handler.handle_action(&action).unwrap();
    }

    #[test]
    fn define_filter_requires_two_params() {
        let mut filters = FilterContainer::new();
        let mut handler = FiltersActionHandler {
            filters: &mut filters,
        };
        let action = ConfigAction {
            name: "define-filter",
            params: vec!["only-name"],
        };
        assert!(handler.handle_action(&action).is_err());
    }

    #[test]
    fn sort_order_parses_method_and_direction() {
        let s = parse_sort_order("title-asc").unwrap();
        assert_eq!(s.method, SortMethod::Title);
        assert_eq!(s.direction, SortDirection::Asc);
    }
}
