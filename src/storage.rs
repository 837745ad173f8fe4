// ABOUTME: Platform config paths and the JSON settings store
// ABOUTME: Settings hold the API token, so writes are atomic and owner-only

use crate::{
    settings::{PartialSettings, Settings, SettingsStore},
    Error, Result,
};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Paths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl Paths {
    /// Uses `settings_override` as the settings file when given, otherwise
    /// `data.json` in the platform config directory.
    pub fn new(settings_override: Option<PathBuf>) -> Result<Self> {
        if let Some(file) = settings_override {
            let config_dir = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            return Ok(Paths {
                config_dir,
                settings_file: file,
            });
        }

        let config_dir = ProjectDirs::from("", "", "readwise-atoms")
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
            .config_dir()
            .to_path_buf();

        Ok(Paths {
            settings_file: config_dir.join("data.json"),
            config_dir,
        })
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        Ok(())
    }
}

/// Writes through a sibling temp file and renames it over `path`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    use rand::Rng;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let random: u32 = rand::thread_rng().gen();
    let tmp_path = dir.join(format!(".{:x}.part", random));

    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp_path, perms)?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSettingsStore { path: path.into() }
    }

    pub fn from_paths(paths: &Paths) -> Self {
        Self::new(paths.settings_file.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Option<PartialSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let saved = serde_json::from_str(&content).map_err(|e| {
            log::error!("Failed to parse settings file {}: {}", self.path.display(), e);
            Error::Parse(e)
        })?;
        Ok(Some(saved))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        write_atomic(&self.path, json.as_bytes())?;
        log::debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}


#[cfg(test)]
mod write_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nested").join("test.txt");
        write_atomic(&target, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        let leftovers: Vec<_> = fs::read_dir(temp.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_write_atomic_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join("test.txt");
        write_atomic(&target, b"hello").unwrap();

        let perms = fs::metadata(&target).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}


#[cfg(test)]
mod fixture_tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("data.json");
        file.write_str(
            r#"{
  "readwiseToken": "abc",
  "readwiseUpdateAfter": "",
  "highlightPathTemplate": "quotes/{{highlight.id}}.md"
}"#,
        )
        .unwrap();

        let store = JsonSettingsStore::new(file.path());
        let settings = Settings::load(&store).unwrap();

        assert_eq!(settings.readwise_token, "abc");
        assert_eq!(settings.readwise_update_after, None);
        assert!(!settings.sync_on_start);
        assert_eq!(settings.templates.highlight_path, "quotes/{{highlight.id}}.md");
        assert_eq!(
            settings.templates.index_path,
            crate::templates::TemplateSet::default().index_path
        );
    }
}
