//! Persisted-state path resolution (spec §6). Grounded on
//! `include/configpaths.h`'s XDG/legacy-dotdir/newsbeuter-migration contract;
//! the header documents the interface only (its implementation is a Rust/C++
//! FFI bridge not present in the source pack), so path-selection behavior
//! here follows the spec's explicit description directly.

use std::path::{Path, PathBuf};

use crate::cliargs::CliArgs;

const APP_DIR_NAME: &str = "newsboat";
const LEGACY_APP_DIR_NAME: &str = "newsbeuter";

/// Resolved filesystem layout: config dir, data dir, and the individual
/// file paths derived from them, with CLI overrides applied last.
pub struct ConfigPaths {
    pub url_file: PathBuf,
    pub cache_file: PathBuf,
    pub config_file: PathBuf,
    pub lock_file: PathBuf,
    pub queue_file: PathBuf,
    pub search_file: PathBuf,
    pub cmdline_file: PathBuf,
    migrated_from_newsbeuter: bool,
}

impl ConfigPaths {
    /// Resolves paths per spec §6's precedence: CLI overrides, then the
    /// legacy dotdir `~/.newsboat/` if present, then XDG dirs, with a
    /// one-time newsbeuter-to-newsboat migration offered when neither
    /// newsboat location exists but a newsbeuter one does.
    pub fn resolve(args: &CliArgs, home: &Path) -> Self {
        let legacy_dotdir = home.join(format!(".{APP_DIR_NAME}"));
        let legacy_newsbeuter_dotdir = home.join(format!(".{LEGACY_APP_DIR_NAME}"));

        let xdg_config = xdg_dir("XDG_CONFIG_HOME", home, ".config").join(APP_DIR_NAME);
        let xdg_data = xdg_dir("XDG_DATA_HOME", home, ".local/share").join(APP_DIR_NAME);
        let xdg_config_newsbeuter =
            xdg_dir("XDG_CONFIG_HOME", home, ".config").join(LEGACY_APP_DIR_NAME);
        let xdg_data_newsbeuter =
            xdg_dir("XDG_DATA_HOME", home, ".local/share").join(LEGACY_APP_DIR_NAME);

        let (config_dir, data_dir, migrated_from_newsbeuter) = if legacy_dotdir.is_dir() {
            (legacy_dotdir.clone(), legacy_dotdir, false)
        } else if xdg_config.is_dir() || xdg_data.is_dir() {
            (xdg_config, xdg_data, false)
        } else if legacy_newsbeuter_dotdir.is_dir() {
            (
                legacy_newsbeuter_dotdir.clone(),
                legacy_newsbeuter_dotdir,
                true,
            )
        } else if xdg_config_newsbeuter.is_dir() || xdg_data_newsbeuter.is_dir() {
            (xdg_config_newsbeuter, xdg_data_newsbeuter, true)
        } else {
            (xdg_config, xdg_data, false)
        };

        let cache_file = data_dir.join("cache.db");
        let mut paths = ConfigPaths {
            url_file: config_dir.join("urls"),
            lock_file: lock_path_for(&cache_file),
            cache_file,
            config_file: config_dir.join("config"),
            queue_file: data_dir.join("queue"),
            search_file: data_dir.join("history.search"),
            cmdline_file: data_dir.join("history.cmdline"),
            migrated_from_newsbeuter,
        };

        if let Some(f) = &args.url_file {
            paths.url_file = f.clone();
        }
        if let Some(f) = &args.cache_file {
            paths.cache_file = f.clone();
            paths.lock_file = lock_path_for(f);
        }
        if let Some(f) = &args.config_file {
            paths.config_file = f.clone();
        }

        paths
    }

    pub fn migrated_from_newsbeuter(&self) -> bool {
        self.migrated_from_newsbeuter
    }

    /// Copies files from a newsbeuter-era directory layout into the
    /// corresponding newsboat locations. No-op if nothing was found to
    /// migrate. Returns whether anything was copied.
    pub fn try_migrate_from_newsbeuter(
        &self,
        newsbeuter_dir: &Path,
    ) -> std::io::Result<bool> {
        let mut copied_anything = false;
        for (name, dest) in [
            ("config", &self.config_file),
            ("urls", &self.url_file),
            ("cache.db", &self.cache_file),
        ] {
            let src = newsbeuter_dir.join(name);
            if src.is_file() && !dest.exists() {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&src, dest)?;
                copied_anything = true;
            }
        }
        Ok(copied_anything)
    }

    pub fn create_dirs(&self) -> std::io::Result<()> {
        for path in [
            &self.url_file,
            &self.cache_file,
            &self.config_file,
            &self.queue_file,
        ] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

fn xdg_dir(env_var: &str, home: &Path, fallback_rel: &str) -> PathBuf {
    std::env::var_os(env_var)
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| home.join(fallback_rel))
}

fn lock_path_for(cache_file: &Path) -> PathBuf {
    let mut s = cache_file.as_os_str().to_os_string();
    s.push(".lock");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            do_import_opml: None,
            do_export_opml: false,
            do_export_opml2: false,
            refresh_on_start: false,
            url_file: None,
            cache_file: None,
            config_file: None,
            vacuum: false,
            cleanup: false,
            cmds_to_execute: None,
            quiet: false,
            readinfo_import_file: None,
            readinfo_export_file: None,
            log_file: None,
            log_level: None,
            show_version: 0,
        }
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let mut args = empty_args();
        args.cache_file = Some(PathBuf::from("/tmp/mycache.db"));
        let paths = ConfigPaths::resolve(&args, Path::new("/home/nobody"));
        assert_eq!(paths.cache_file, PathBuf::from("/tmp/mycache.db"));
        assert_eq!(paths.lock_file, PathBuf::from("/tmp/mycache.db.lock"));
    }

    #[test]
    fn falls_back_to_xdg_when_no_legacy_dirs_exist() {
        let args = empty_args();
        let paths = ConfigPaths::resolve(&args, Path::new("/home/nobody-without-dotdirs"));
        assert!(!paths.migrated_from_newsbeuter());
        assert!(paths.config_file.to_string_lossy().contains("newsboat"));
    }
}
