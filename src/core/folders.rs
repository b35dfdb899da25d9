//! Output and temp folder resolution
//!
//! Folders are resolved once, before a session starts, and are read-only
//! for the rest of the session.

use crate::core::config::ConfigError;
use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

/// Prepares a directory for use, generating one when none is configured
pub trait OutputFolderResolver {
    fn resolve_folder(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError>;
}

/// Resolver backed by the local filesystem
///
/// Unset folders become a fresh `<prefix>-<random>` directory under the
/// system temp directory.
#[derive(Debug, Clone)]
pub struct FsFolderResolver {
    prefix: String,
    temp_root: PathBuf,
}

impl FsFolderResolver {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            temp_root: std::env::temp_dir(),
        }
    }

    /// Generate unset folders under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    fn generated_path(&self) -> PathBuf {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        self.temp_root
            .join(format!("{}-{}", self.prefix, suffix.to_lowercase()))
    }
}

impl OutputFolderResolver for FsFolderResolver {
    fn resolve_folder(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let folder = match path {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => {
                let generated = self.generated_path();
                info!("No folder configured, using {}", generated.display());
                generated
            }
        };

        if folder.exists() && !folder.is_dir() {
            return Err(ConfigError::FolderError(
                folder,
                "exists and is not a directory".to_string(),
            ));
        }

        fs::create_dir_all(&folder)
            .map_err(|e| ConfigError::FolderError(folder.clone(), e.to_string()))?;

        let metadata = fs::metadata(&folder)
            .map_err(|e| ConfigError::FolderError(folder.clone(), e.to_string()))?;
        if metadata.permissions().readonly() {
            return Err(ConfigError::FolderError(folder, "is read-only".to_string()));
        }

        debug!("Folder ready: {}", folder.display());
        Ok(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_configured_folder() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");

        let resolved = FsFolderResolver::new("scans")
            .resolve_folder(Some(&target))
            .unwrap();

        assert_eq!(resolved, target);
        assert!(target.is_dir());
    }

    #[test]
    fn test_generates_folder_when_unset() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scans").with_temp_root(dir.path());

        let first = resolver.resolve_folder(None).unwrap();
        let second = resolver.resolve_folder(Some(Path::new(""))).unwrap();

        assert!(first.is_dir());
        assert!(second.is_dir());
        assert_ne!(first, second);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scans-"));
        assert!(first.starts_with(dir.path()));
    }

    #[test]
    fn test_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();

        let result = FsFolderResolver::new("scans").resolve_folder(Some(&file));
        assert!(matches!(result, Err(ConfigError::FolderError(_, _))));
    }
}
