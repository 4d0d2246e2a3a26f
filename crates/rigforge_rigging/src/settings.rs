// SPDX-License-Identifier: MIT OR Apache-2.0
//! User settings.
//!
//! Settings are a two-level map of category to name to value, stored as
//! RON. [`RigPreferences`] is the typed snapshot the lifecycle reads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Category read by the component lifecycle
pub const RIG_COMPONENTS: &str = "RigComponents";
/// Category read by addons
pub const OVERDRIVER: &str = "Overdriver";

/// A single setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Text(String),
}

impl SettingValue {
    /// Read as a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Error raised when loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored text is not valid RON
    #[error("Settings parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Settings serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Category → name → value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    categories: IndexMap<String, IndexMap<String, SettingValue>>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Self {
            categories: IndexMap::new(),
        };
        settings.set(RIG_COMPONENTS, "bake_component", true);
        settings.set(RIG_COMPONENTS, "revert_animation", false);
        settings.set(RIG_COMPONENTS, "force_remove", false);
        settings.set(RIG_COMPONENTS, "remove_existing", false);
        settings.set(OVERDRIVER, "no_bake_overdrivers", false);
        settings
    }
}

impl Settings {
    /// Get a value
    pub fn get(&self, category: &str, name: &str) -> Option<&SettingValue> {
        self.categories.get(category)?.get(name)
    }

    /// Set a value, creating the category when needed
    pub fn set(&mut self, category: &str, name: &str, value: impl Into<SettingValue>) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(name.to_string(), value.into());
    }

    /// Read a bool, falling back to `default`
    pub fn bool_or(&self, category: &str, name: &str, default: bool) -> bool {
        self.get(category, name)
            .and_then(SettingValue::as_bool)
            .unwrap_or(default)
    }

    /// Overlay another set of values onto this one
    pub fn merge(&mut self, other: Settings) {
        for (category, values) in other.categories {
            let target = self.categories.entry(category).or_default();
            target.extend(values);
        }
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Parse from RON
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }
}

/// Persistent settings storage
pub trait SettingsStore {
    /// Load settings. Missing values keep their defaults.
    fn load(&self) -> Result<Settings, SettingsError>;

    /// Save settings
    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Settings stored in a RON file
#[derive(Debug, Clone)]
pub struct RonSettingsStore {
    path: PathBuf,
}

impl RonSettingsStore {
    /// Store settings at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for RonSettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::default();
        if !self.path.exists() {
            tracing::debug!("No settings at {}, using defaults", self.path.display());
            return Ok(settings);
        }
        let content = std::fs::read_to_string(&self.path)?;
        settings.merge(Settings::from_ron(&content)?);
        tracing::info!("Loaded settings from {}", self.path.display());
        Ok(settings)
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        std::fs::write(&self.path, settings.to_ron()?)?;
        tracing::info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

/// Settings held as RON text in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    text: Option<String>,
}

impl MemorySettingsStore {
    /// Start from stored text
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// Stored text, if anything was saved
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::default();
        if let Some(text) = &self.text {
            settings.merge(Settings::from_ron(text)?);
        }
        Ok(settings)
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        self.text = Some(settings.to_ron()?);
        Ok(())
    }
}

/// Typed view of the preferences the lifecycle reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigPreferences {
    /// Bake skeleton animation when removing a component
    pub bake_component: bool,
    /// Restore the skeleton's pre-rig curves when not baking
    pub revert_animation: bool,
    /// Keep going past failed removal steps
    pub force_remove: bool,
    /// Replace components already on the requested joints
    pub remove_existing: bool,
    /// Skip baking the overdriven control when adding an overdriver
    pub no_bake_overdrivers: bool,
}

impl RigPreferences {
    /// Read from settings, defaulting missing values
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bake_component: settings.bool_or(RIG_COMPONENTS, "bake_component", true),
            revert_animation: settings.bool_or(RIG_COMPONENTS, "revert_animation", false),
            force_remove: settings.bool_or(RIG_COMPONENTS, "force_remove", false),
            remove_existing: settings.bool_or(RIG_COMPONENTS, "remove_existing", false),
            no_bake_overdrivers: settings.bool_or(OVERDRIVER, "no_bake_overdrivers", false),
        }
    }
}

impl Default for RigPreferences {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = RigPreferences::default();
        assert!(prefs.bake_component);
        assert!(!prefs.revert_animation);
        assert!(!prefs.force_remove);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let store = MemorySettingsStore::with_text(r#"{"RigComponents": {"bake_component": Bool(false)}}"#);
        let settings = store.load().unwrap();
        let prefs = RigPreferences::from_settings(&settings);
        assert!(!prefs.bake_component);
        assert!(!prefs.no_bake_overdrivers);
        assert_eq!(
            settings.get(OVERDRIVER, "no_bake_overdrivers"),
            Some(&SettingValue::Bool(false))
        );
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemorySettingsStore::default();
        let mut settings = Settings::default();
        settings.set(RIG_COMPONENTS, "revert_animation", true);
        settings.set("Export", "root_path", "/tmp/anim");
        store.save(&settings).unwrap();

        assert!(store.text().unwrap().contains("revert_animation"));
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_bad_text_is_a_parse_error() {
        let store = MemorySettingsStore::with_text("{ not ron");
        assert!(matches!(store.load(), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_file_store_missing_file_uses_defaults() {
        let store = RonSettingsStore::new(std::env::temp_dir().join("rigforge_missing_settings.ron"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }
}
