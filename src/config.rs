use crate::app_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Estimate given to items added from the TUI before they are edited.
    pub default_estimate_minutes: f64,
    /// Seed the sample agenda when no stored session exists. With this
    /// off, a cold start begins with an empty agenda instead.
    pub seed_sample_on_empty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_estimate_minutes: 5.0,
            seed_sample_on_empty: true,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("gavel_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            default_estimate_minutes: 10.0,
            seed_sample_on_empty: false,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn unreadable_config_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"{broken").unwrap();
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());
    }
}
