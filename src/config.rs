//! `persistkit.toml`: storage location, participating types, cursor variant

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::storage::{CursorMode, IN_MEMORY};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file, or `:memory:`
    pub database: String,
    /// Ordered participating type names; empty means every registered type
    pub types: Vec<String>,
    pub cursor: CursorMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path_in(Path::new("."))
                .display()
                .to_string(),
            types: Vec::new(),
            cursor: CursorMode::default(),
        }
    }
}

impl Config {
    /// A configuration backed by an in-memory store
    pub fn in_memory() -> Self {
        Self {
            database: IN_MEMORY.to_string(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("persistkit.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".persistkit").join("persistkit.db")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&contents)?;
    tracing::debug!(target: "persistkit::config", "loaded {}", path.display());
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &Config, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::configuration(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Keep the database directory out of version control
pub fn ensure_gitignore(project_root: &Path) -> Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".persistkit/";

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistkit.toml");
        let config = Config {
            database: "store.db".into(),
            types: vec!["Address".into(), "Customer".into()],
            cursor: CursorMode::Buffered,
        };

        write_config(&path, &config, false).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("cursor = \"buffered\""));
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config.clone()));

        let err = write_config(&path, &config, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(write_config(&path, &config, true).is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistkit.toml");
        std::fs::write(&path, "database = \":memory:\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert!(config.is_in_memory());
        assert!(config.types.is_empty());
        assert_eq!(config.cursor, CursorMode::Streaming);
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistkit.toml");
        std::fs::write(&path, "cursor = \"sideways\"\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_ensure_db_dir_and_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = default_database_path_in(dir.path());
        ensure_db_dir(&db_path).unwrap();
        assert!(db_path.parent().unwrap().is_dir());

        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();
        let ignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(ignore, ".persistkit/\n");
    }
}
