use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use engine::Value;

pub const CONFIG_FILE: &str = "regen.toml";

/// Optional `regen.toml` configuration, looked up next to the target file
/// and then in the working directory. Command-line flags override it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Namespace token of the directive markers.
    pub namespace: Option<String>,
    /// Stamp a `last update` metadata line on successful renders.
    pub stamp_metadata: Option<bool>,
    /// Front-matter key that opts a document out of processing.
    pub ignore_key: Option<String>,
    /// Static bindings available to every expression.
    #[serde(default)]
    pub bindings: HashMap<String, toml::Value>,
}

impl Config {
    pub fn load(target: &Path) -> Result<Config, String> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
            candidates.push(dir.join(CONFIG_FILE));
        }
        candidates.push(PathBuf::from(CONFIG_FILE));

        for path in candidates {
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            return toml::from_str(&text)
                .map_err(|e| format!("invalid {}: {}", path.display(), e));
        }

        Ok(Config::default())
    }

    pub fn binding_values(&self) -> HashMap<String, Value> {
        self.bindings
            .iter()
            .map(|(name, value)| (name.clone(), toml_to_value(value)))
            .collect()
    }
}

fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => Value::Number(*n as f64),
        toml::Value::Float(n) => Value::Number(*n),
        toml::Value::Boolean(b) => Value::Boolean(*b),
        other => Value::String(other.to_string()),
    }
}
