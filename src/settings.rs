use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TillrollError};

pub const DB_FILE: &str = "tillroll.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_upload_mb() -> u64 {
    10
}

fn default_batch_size() -> usize {
    1000
}

fn default_worker_threads() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            max_upload_mb: default_max_upload_mb(),
            batch_size: default_batch_size(),
            worker_threads: default_worker_threads(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("tmp")
    }

    pub fn exports_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("exports")
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Environment variables win over the settings file.
    fn apply_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("TILLROLL_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = shellexpand_path(dir.trim());
            }
        }
        if let Some(mb) = std::env::var("TILLROLL_MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            self.max_upload_mb = mb;
        }
        self
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tillroll")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("tillroll")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    let settings = if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    };
    settings.apply_env()
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TillrollError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.max_upload_mb, 10);
        assert_eq!(s.batch_size, 1000);
        assert_eq!(s.worker_threads, 1);
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/tillroll-test", "batch_size": 250}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.batch_size, 250);
        assert_eq!(s.max_upload_mb, 10);
        assert_eq!(s.poll_interval_ms, 500);
    }

    #[test]
    fn test_derived_paths() {
        let s = Settings {
            data_dir: "/srv/pos".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.db_path(), PathBuf::from("/srv/pos/tillroll.db"));
        assert_eq!(s.tmp_dir(), PathBuf::from("/srv/pos/tmp"));
        assert_eq!(s.max_upload_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            max_upload_mb: 25,
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let loaded: Settings = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.max_upload_mb, 25);
    }
}
