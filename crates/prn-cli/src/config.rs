//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use prn_core::{Identity, NotificationPreferences, ValidationError};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Your username or email on the server. Used to mark your own pull
    /// requests and comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Which notifications to deliver.
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("username", &self.username.as_ref().map(|_| "[set]"))
            .field("notifications", &self.notifications)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("prn.db"),
            username: None,
            notifications: NotificationPreferences::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `config.toml` in the config directory,
    /// the given file, then `PRN_*` environment variables. Nested keys use
    /// `__`, e.g. `PRN_NOTIFICATIONS__TASKS=false`.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("PRN_").split("__"));

        figment.extract()
    }

    /// The configured identity, if a username is set.
    pub fn identity(&self) -> Result<Option<Identity>, ValidationError> {
        self.username.clone().map(Identity::new).transpose()
    }

    /// Lock file guarding the database during a pass.
    pub fn lock_path(&self) -> PathBuf {
        self.database_path.with_extension("lock")
    }
}

/// Returns the platform-specific config directory for prn.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("prn"))
}

/// Returns the platform-specific data directory for prn.
///
/// On Linux: `~/.local/share/prn`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("prn"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_prn() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "prn");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("prn.db"));
        assert!(config.username.is_none());
        assert_eq!(config.notifications, NotificationPreferences::default());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/elsewhere.db"
username = "asmith"

[notifications]
tasks = false
filter_own_activities = true
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.username.as_deref(), Some("asmith"));
        assert!(!config.notifications.tasks);
        assert!(config.notifications.comments);
        assert!(config.notifications.filter_own_activities);
    }

    #[test]
    fn test_identity_rejects_blank_username() {
        let config = Config {
            username: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(config.identity().is_err());

        let config = Config {
            username: Some("asmith".to_string()),
            ..Config::default()
        };
        assert_eq!(config.identity().unwrap().unwrap().as_str(), "asmith");
        assert!(Config::default().identity().unwrap().is_none());
    }

    #[test]
    fn test_debug_hides_username() {
        let config = Config {
            username: Some("asmith".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("asmith"));
        assert!(debug.contains("[set]"));
    }

    #[test]
    fn test_lock_path_sits_next_to_database() {
        let config = Config {
            database_path: PathBuf::from("/data/prn.db"),
            ..Config::default()
        };
        assert_eq!(config.lock_path(), PathBuf::from("/data/prn.lock"));
    }
}
