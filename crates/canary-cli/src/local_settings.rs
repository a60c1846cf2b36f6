use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Key/value pairs read from the `Values` object of a `local.settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LocalSettings {
    values: BTreeMap<String, String>,
}

impl LocalSettings {
    /// Missing file yields empty settings; a present but invalid file is an error.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let Some(values) = parsed.get("Values") else {
            return Ok(Self::default());
        };
        let Value::Object(entries) = values else {
            bail!("{}: \"Values\" must be a JSON object", path.display());
        };

        let values = entries
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text.trim().to_string(),
                    Value::Number(number) => number.to_string(),
                    Value::Bool(flag) => flag.to_string(),
                    _ => return None,
                };
                (!text.is_empty()).then(|| (key.clone(), text))
            })
            .collect();
        Ok(Self { values })
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns `current` when set, else the settings value for `key`.
    pub(crate) fn fill(&self, current: Option<String>, key: &str) -> Option<String> {
        current
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.get(key).map(str::to_string))
    }
}
