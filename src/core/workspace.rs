//! Workspace discovery and layout
//!
//! A workspace is a directory holding `.nr13/` (config, database, session)
//! and a `reports/` directory for generated PDFs.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the marker directory
pub const NR13_DIR: &str = ".nr13";

/// Represents an NR-13 tracker workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory containing `.nr13/`
    root: PathBuf,
}

impl Workspace {
    /// Find the workspace by walking up from the current directory
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current = std::env::current_dir().map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find the workspace by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        loop {
            if current.join(NR13_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create the workspace layout at `path`
    ///
    /// With `force`, an existing `.nr13/` is reused and its config rewritten;
    /// the database file is never touched here.
    pub fn init(path: &Path, force: bool) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(path).map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let nr13_dir = root.join(NR13_DIR);
        if nr13_dir.exists() && !force {
            return Err(WorkspaceError::AlreadyExists(root));
        }

        std::fs::create_dir_all(&nr13_dir).map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        std::fs::create_dir_all(root.join("reports"))
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        std::fs::write(nr13_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        std::fs::write(nr13_dir.join(".gitignore"), "nr13.db*\nsession.yaml\n")
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# NR-13 tracker workspace configuration
# Environment variables and a .env file in the workspace root override these.

# Database file, relative to .nr13/ (DB_NAME)
# database: nr13.db

# Directory for generated PDF reports, relative to the workspace root (NR13_REPORTS_DIR)
# reports_dir: reports

# Days before the due date at which maintenance is flagged (NR13_DUE_SOON_DAYS)
# due_soon_days: 30

# Outgoing mail for reminders
# smtp:
#   host: smtp.example.com
#   port: 587
#   username: ""
#   from: "NR-13 Tracker <nr13@example.com>"
#   starttls: true
"#
    }

    /// Directory containing `.nr13/`
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.nr13` directory
    pub fn nr13_dir(&self) -> PathBuf {
        self.root.join(NR13_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.nr13_dir().join("config.yaml")
    }

    /// Resolve a path relative to the workspace root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Errors that can occur while locating or creating a workspace
#[derive(Debug, Error, Diagnostic)]
pub enum WorkspaceError {
    #[error("not an NR-13 workspace (searched from {searched_from:?})")]
    #[diagnostic(
        code(nr13::workspace::not_found),
        help("Run 'nr13 init' to create one, or pass --workspace")
    )]
    NotFound { searched_from: PathBuf },

    #[error("NR-13 workspace already exists at {0:?}")]
    #[diagnostic(code(nr13::workspace::exists), help("Use --force to reinitialize it"))]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path(), false).unwrap();

        assert!(ws.nr13_dir().is_dir());
        assert!(ws.config_path().exists());
        assert!(ws.root().join("reports").is_dir());
    }

    #[test]
    fn test_workspace_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path(), false).unwrap();

        let err = Workspace::init(tmp.path(), false).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
        assert!(Workspace::init(tmp.path(), true).is_ok());
    }

    #[test]
    fn test_workspace_discover_from_subdirectory() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path(), false).unwrap();

        let subdir = tmp.path().join("reports/2025");
        std::fs::create_dir_all(&subdir).unwrap();

        let ws = Workspace::discover_from(&subdir).unwrap();
        assert_eq!(ws.root(), tmp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_workspace_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Workspace::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }
}
