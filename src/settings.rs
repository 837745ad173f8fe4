// ABOUTME: Persisted settings model and the store trait it is loaded through
// ABOUTME: Persisted values merge over bundled defaults on load

use crate::{templates::TemplateSet, Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub readwise_token: String,
    /// High-water mark of the last successful sync (ISO-8601).
    pub readwise_update_after: Option<String>,
    pub sync_on_start: bool,
    #[serde(flatten)]
    pub templates: TemplateSet,
    pub rate_limit_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            readwise_token: String::new(),
            readwise_update_after: None,
            sync_on_start: false,
            templates: TemplateSet::default(),
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
        }
    }
}

/// Whatever subset of settings a store had persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialSettings {
    pub readwise_token: Option<String>,
    pub readwise_update_after: Option<String>,
    pub sync_on_start: Option<bool>,
    pub index_path_template: Option<String>,
    pub index_file_template: Option<String>,
    pub highlight_path_template: Option<String>,
    pub highlight_file_template: Option<String>,
    pub rate_limit_retries: Option<u32>,
}

pub trait SettingsStore {
    fn load(&self) -> Result<Option<PartialSettings>>;

    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Keys accepted by [`Settings::set`], in display order.
pub const KEYS: &[&str] = &[
    "readwiseToken",
    "readwiseUpdateAfter",
    "syncOnStart",
    "indexPathTemplate",
    "indexFileTemplate",
    "highlightPathTemplate",
    "highlightFileTemplate",
    "rateLimitRetries",
];

impl Settings {
    pub fn load(store: &impl SettingsStore) -> Result<Self> {
        let mut settings = Settings::default();
        if let Some(saved) = store.load()? {
            settings.merge(saved);
        }
        Ok(settings)
    }

    pub fn merge(&mut self, saved: PartialSettings) {
        if let Some(token) = saved.readwise_token {
            self.readwise_token = token;
        }
        if saved.readwise_update_after.is_some() {
            self.readwise_update_after = saved.readwise_update_after.filter(|ts| !ts.is_empty());
        }
        if let Some(sync_on_start) = saved.sync_on_start {
            self.sync_on_start = sync_on_start;
        }
        if let Some(template) = saved.index_path_template {
            self.templates.index_path = template;
        }
        if let Some(template) = saved.index_file_template {
            self.templates.index_file = template;
        }
        if let Some(template) = saved.highlight_path_template {
            self.templates.highlight_path = template;
        }
        if let Some(template) = saved.highlight_file_template {
            self.templates.highlight_file = template;
        }
        if let Some(retries) = saved.rate_limit_retries {
            self.rate_limit_retries = retries;
        }
    }

    /// Sets one setting from its persisted key and a string value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "readwiseToken" => self.readwise_token = value.trim().to_string(),
            "readwiseUpdateAfter" => {
                let value = value.trim();
                if value.is_empty() {
                    self.readwise_update_after = None;
                } else {
                    chrono::DateTime::parse_from_rfc3339(value).map_err(|e| {
                        Error::Config(format!("readwiseUpdateAfter must be ISO-8601: {}", e))
                    })?;
                    self.readwise_update_after = Some(value.to_string());
                }
            }
            "syncOnStart" => {
                self.sync_on_start = value.trim().parse().map_err(|_| {
                    Error::Config(format!("syncOnStart must be true or false, got {:?}", value))
                })?
            }
            "indexPathTemplate" => self.templates.index_path = value.to_string(),
            "indexFileTemplate" => self.templates.index_file = value.to_string(),
            "highlightPathTemplate" => self.templates.highlight_path = value.to_string(),
            "highlightFileTemplate" => self.templates.highlight_file = value.to_string(),
            "rateLimitRetries" => {
                self.rate_limit_retries = value.trim().parse().map_err(|_| {
                    Error::Config(format!(
                        "rateLimitRetries must be a non-negative number, got {:?}",
                        value
                    ))
                })?
            }
            _ => {
                return Err(Error::Config(format!(
                    "unknown setting {:?} (valid: {})",
                    key,
                    KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Settings as JSON with the token masked, for display.
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if !self.readwise_token.is_empty() {
            value["readwiseToken"] = serde_json::Value::String("********".into());
        }
        value
    }
}
