//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::core::maintenance::{DEFAULT_DUE_SOON_DAYS, MAX_DAYS};
use crate::core::workspace::Workspace;

const REDACTED: &str = "********";

/// Tracker configuration with layered hierarchy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file, relative to `.nr13/` unless absolute
    pub database: Option<String>,

    /// Settings of the former SQL Server deployment
    pub connection: ConnectionConfig,

    /// Report output directory, relative to the workspace root unless absolute
    pub reports_dir: Option<PathBuf>,

    /// Days before a due date at which maintenance counts as due soon
    pub due_soon_days: Option<i64>,

    /// Output format used when `--format` is left on `auto`
    pub default_format: Option<String>,

    pub smtp: SmtpConfig,
}

/// `DB_SERVER`, `DB_USERNAME`, `DB_PASSWORD`, `DB_TRUSTED_CONNECTION`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub trusted_connection: Option<bool>,
}

impl ConnectionConfig {
    fn is_set(&self) -> bool {
        self.server.is_some()
            || self.username.is_some()
            || self.password.is_some()
            || self.trusted_connection.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub starttls: Option<bool>,
}

/// Resolved SMTP relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub from: String,
    pub starttls: bool,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(workspace: Option<&Workspace>) -> Self {
        // 1-3. Built-in defaults, global and workspace config files
        let mut config = Self::load_files(workspace);

        if let Some(ws) = workspace {
            // .env never overrides variables already set in the process
            let dotenv = ws.root().join(".env");
            if dotenv.exists() {
                if let Err(e) = dotenvy::from_path(&dotenv) {
                    warn!(path = %dotenv.display(), error = %e, "could not read .env file");
                }
            }
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        if config.connection.is_set() {
            warn!("DB_SERVER/DB_USERNAME/DB_PASSWORD/DB_TRUSTED_CONNECTION are ignored by the embedded database");
        }

        config
    }

    /// Built-in defaults overlaid with the global and workspace config files only
    pub fn load_files(workspace: Option<&Workspace>) -> Self {
        let mut config = Config::default();

        // Global user config (~/.config/nr13/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // Workspace config (.nr13/config.yaml)
        if let Some(ws) = workspace {
            if let Some(local) = Self::read_file(&ws.config_path()) {
                config.merge(local);
            }
        }

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                None
            }
        }
    }

    /// Overlay values from environment variables, looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let text = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = text("DB_NAME") {
            self.database = Some(v);
        }
        if let Some(v) = text("DB_SERVER") {
            self.connection.server = Some(v);
        }
        if let Some(v) = text("DB_USERNAME") {
            self.connection.username = Some(v);
        }
        if let Some(v) = text("DB_PASSWORD") {
            self.connection.password = Some(v);
        }
        if let Some(v) = text("DB_TRUSTED_CONNECTION") {
            self.connection.trusted_connection = parse_flag("DB_TRUSTED_CONNECTION", &v);
        }
        if let Some(v) = text("NR13_REPORTS_DIR") {
            self.reports_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = text("NR13_DUE_SOON_DAYS") {
            match v.trim().parse::<i64>() {
                Ok(days) if days >= 0 => self.due_soon_days = Some(days),
                _ => warn!(value = %v, "ignoring invalid NR13_DUE_SOON_DAYS"),
            }
        }
        if let Some(v) = text("SMTP_HOST") {
            self.smtp.host = Some(v);
        }
        if let Some(v) = text("SMTP_PORT") {
            match v.trim().parse::<u16>() {
                Ok(port) => self.smtp.port = Some(port),
                Err(_) => warn!(value = %v, "ignoring invalid SMTP_PORT"),
            }
        }
        if let Some(v) = text("SMTP_USERNAME") {
            self.smtp.username = Some(v);
        }
        if let Some(v) = text("SMTP_PASSWORD") {
            self.smtp.password = Some(v);
        }
        if let Some(v) = text("SMTP_FROM") {
            self.smtp.from = Some(v);
        }
        if let Some(v) = text("SMTP_STARTTLS") {
            self.smtp.starttls = parse_flag("SMTP_STARTTLS", &v);
        }
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "nr13")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.connection.server.is_some() {
            self.connection.server = other.connection.server;
        }
        if other.connection.username.is_some() {
            self.connection.username = other.connection.username;
        }
        if other.connection.password.is_some() {
            self.connection.password = other.connection.password;
        }
        if other.connection.trusted_connection.is_some() {
            self.connection.trusted_connection = other.connection.trusted_connection;
        }
        if other.reports_dir.is_some() {
            self.reports_dir = other.reports_dir;
        }
        if other.due_soon_days.is_some() {
            self.due_soon_days = other.due_soon_days;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.smtp.host.is_some() {
            self.smtp.host = other.smtp.host;
        }
        if other.smtp.port.is_some() {
            self.smtp.port = other.smtp.port;
        }
        if other.smtp.username.is_some() {
            self.smtp.username = other.smtp.username;
        }
        if other.smtp.password.is_some() {
            self.smtp.password = other.smtp.password;
        }
        if other.smtp.from.is_some() {
            self.smtp.from = other.smtp.from;
        }
        if other.smtp.starttls.is_some() {
            self.smtp.starttls = other.smtp.starttls;
        }
    }

    /// Database file for the workspace
    pub fn database_path(&self, workspace: &Workspace) -> PathBuf {
        let name = self.database.as_deref().unwrap_or("nr13.db");
        let path = PathBuf::from(name);
        let path = if path.extension().is_none() {
            path.with_extension("db")
        } else {
            path
        };
        if path.is_absolute() {
            path
        } else {
            workspace.nr13_dir().join(path)
        }
    }

    /// Directory receiving generated reports
    pub fn reports_dir(&self, workspace: &Workspace) -> PathBuf {
        let dir = self
            .reports_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("reports"));
        workspace.resolve(&dir)
    }

    pub fn due_soon_days(&self) -> i64 {
        self.due_soon_days
            .unwrap_or(DEFAULT_DUE_SOON_DAYS)
            .clamp(0, MAX_DAYS)
    }

    /// SMTP relay settings, `None` when no host is configured
    pub fn smtp(&self) -> Option<SmtpSettings> {
        let host = self.smtp.host.clone()?;
        let credentials = match (&self.smtp.username, &self.smtp.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };
        let from = self
            .smtp
            .from
            .clone()
            .or_else(|| self.smtp.username.clone().filter(|u| u.contains('@')))
            .unwrap_or_else(|| format!("nr13@{}", host));

        Some(SmtpSettings {
            port: self.smtp.port.unwrap_or(587),
            starttls: self.smtp.starttls.unwrap_or(true),
            host,
            credentials,
            from,
        })
    }

    /// Copy with passwords masked, for display
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if copy.connection.password.is_some() {
            copy.connection.password = Some(REDACTED.to_string());
        }
        if copy.smtp.password.is_some() {
            copy.smtp.password = Some(REDACTED.to_string());
        }
        copy
    }
}

fn parse_flag(key: &str, value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value, "ignoring invalid boolean");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: Config = serde_yml::from_str("due_soon_days: 15\nsmtp:\n  host: a.example\n").unwrap();
        config.apply_env(env(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_STARTTLS", "false"),
            ("NR13_DUE_SOON_DAYS", "not-a-number"),
        ]));

        assert_eq!(config.due_soon_days(), 15);
        let smtp = config.smtp().unwrap();
        assert_eq!(smtp.host, "mail.example.com");
        assert_eq!(smtp.port, 2525);
        assert!(!smtp.starttls);
        assert_eq!(smtp.from, "nr13@mail.example.com");
        assert!(smtp.credentials.is_none());
    }

    #[test]
    fn test_smtp_absent_without_host() {
        let config = Config::default();
        assert!(config.smtp().is_none());
        assert_eq!(config.due_soon_days(), DEFAULT_DUE_SOON_DAYS);
    }

    #[test]
    fn test_database_path_resolution() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path(), false).unwrap();

        let mut config = Config::default();
        assert_eq!(config.database_path(&ws), ws.nr13_dir().join("nr13.db"));

        config.apply_env(env(&[("DB_NAME", "NR13_Inspecoes")]));
        assert_eq!(
            config.database_path(&ws),
            ws.nr13_dir().join("NR13_Inspecoes.db")
        );
        assert_eq!(config.reports_dir(&ws), ws.root().join("reports"));
    }

    #[test]
    fn test_redacted_masks_passwords() {
        let mut config = Config::default();
        config.apply_env(env(&[("DB_PASSWORD", "hunter2"), ("SMTP_PASSWORD", "s3cret")]));
        let shown = serde_yml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains(REDACTED));
    }
}
