use super::files::{atomic_write, read_file};
use crate::domain::DEFAULT_NAME_PREFIX;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-folder settings stored in settings.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Archive document currently in use (file name inside the folder)
    #[serde(default)]
    pub active_file: Option<String>,

    /// Prefix for generated names ("Task 3")
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Two-character tags offered for prefixing task names
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_file: None,
            name_prefix: default_name_prefix(),
            tags: Vec::new(),
        }
    }
}

/// Load settings from settings.json
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();

    let Some(content) = read_file(path)? else {
        return Ok(Settings::default());
    };

    let settings: Settings = serde_json::from_str(&content)
        .with_context(|| format!("Invalid settings file: {}", path.display()))?;
    Ok(settings)
}

/// Save settings to settings.json
pub fn save_settings<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    atomic_write(path, &json)?;
    Ok(())
}
