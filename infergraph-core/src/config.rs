//! Stage configuration as an ordered list of named items

use serde::{Deserialize, Serialize};

/// One named configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    /// Item name, e.g. `model_path`
    pub name: String,

    /// Item value, always carried as a string
    pub value: String,
}

/// Ordered key/value configuration handed to a stage at init time
///
/// Stages and adapters look items up by name and ignore items they do not
/// understand, so one deployment description can carry settings for every
/// stage variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    items: Vec<ConfigItem>,
}

impl StageConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item, builder style
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Append an item
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.items.push(ConfigItem {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Look up the first item with the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.as_str())
    }

    /// All items in declaration order
    pub fn items(&self) -> &[ConfigItem] {
        &self.items
    }
}

/// Opaque key/value context passed to every model run
///
/// Built once per inference stage from its configuration; runners read
/// whatever keys they understand.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    config: StageConfig,
}

impl RunContext {
    /// Build a run context from a stage configuration
    pub fn from_config(config: &StageConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Look up a context value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.config.get(name)
    }
}
