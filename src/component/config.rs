//! Component configuration, read once at construction.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::context::Params;

/// Errors produced while reading component parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid component parameters: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// How a component's result is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// Rendered through a template page.
    #[default]
    Html,
    /// Serialized as the whole response body.
    Json,
}

/// Caching and output settings of a component.
///
/// Deserializes from the component parameter map using the upper-case keys
/// `CACHE_ENABLED`, `CACHE_TIME` (seconds), `CACHE_DIR`, and `RESULT_TYPE`
/// (`"html"` or `"json"`). Unknown keys are ignored.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use rcomp::component::{ComponentConfig, ResultFormat};
///
/// let params = json!({"CACHE_ENABLED": true, "CACHE_TIME": 60, "RESULT_TYPE": "json"});
/// let config = ComponentConfig::from_params(params.as_object().unwrap()).unwrap();
/// assert!(config.cache_enabled);
/// assert_eq!(config.cache_time, 60);
/// assert_eq!(config.result_format, ResultFormat::Json);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    #[serde(rename = "CACHE_ENABLED")]
    pub cache_enabled: bool,
    #[serde(rename = "CACHE_TIME")]
    pub cache_time: u64,
    #[serde(rename = "CACHE_DIR")]
    pub cache_dir: Option<String>,
    #[serde(rename = "RESULT_TYPE")]
    pub result_format: ResultFormat,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            cache_enabled: false,
            cache_time: 3600,
            cache_dir: None,
            result_format: ResultFormat::Html,
        }
    }
}

impl ComponentConfig {
    /// Reads the configuration from a component parameter map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a recognized key has the wrong type
    /// (e.g. `CACHE_TIME: "soon"`).
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(Value::Object(params.clone()))?)
    }

    #[must_use]
    pub fn with_cache(mut self, enabled: bool, ttl_secs: u64) -> Self {
        self.cache_enabled = enabled;
        self.cache_time = ttl_secs;
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<String>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.result_format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults_when_empty() {
        let config = ComponentConfig::from_params(&Params::new()).unwrap();
        assert_eq!(config, ComponentConfig::default());
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_time, 3600);
        assert_eq!(config.result_format, ResultFormat::Html);
    }

    #[test]
    fn reads_all_keys() {
        let config = ComponentConfig::from_params(&params(json!({
            "CACHE_ENABLED": true,
            "CACHE_TIME": 120,
            "CACHE_DIR": "lists",
            "RESULT_TYPE": "json",
            "SOMETHING_ELSE": [1, 2, 3],
        })))
        .unwrap();

        assert_eq!(
            config,
            ComponentConfig::default()
                .with_cache(true, 120)
                .with_cache_dir("lists")
                .with_format(ResultFormat::Json)
        );
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = ComponentConfig::from_params(&params(json!({"CACHE_TIME": "soon"})));
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = ComponentConfig::from_params(&params(json!({"RESULT_TYPE": "xml"})));
        assert!(err.is_err());
    }
}
