// SPDX-License-Identifier: Apache-2.0
//! Filesystem-backed [`ConfigStore`], mirrored directly from
//! `echo_config_fs::FsConfigStore` (platform config directory, one JSON
//! file per key).

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::config::{ConfigError, ConfigStore};

/// Stores configs as JSON files under the platform config directory
/// (`~/.config/landkeeper` on Linux, the `Application Support` equivalent
/// elsewhere).
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory.
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "landkeeper", "LandKeeper")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir().to_path_buf())
    }

    /// Create a store rooted at an explicit directory, e.g. for tests or a
    /// caller-chosen deployment path.
    pub fn at(base: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigService;

    #[test]
    fn round_trips_through_a_temp_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsConfigStore::at(dir.path().to_path_buf()).expect("store");
        let service = ConfigService::new(store);
        service.save("land_config", &("hello", 7)).expect("save");
        let loaded: Option<(String, i32)> = service.load("land_config").expect("load");
        assert_eq!(loaded, Some(("hello".to_string(), 7)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsConfigStore::at(dir.path().to_path_buf()).expect("store");
        assert!(matches!(store.load_raw("nope"), Err(ConfigError::NotFound)));
    }
}
