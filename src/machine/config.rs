//! Machine configuration.

use crate::logger::LogLevel;
use serde::{Deserialize, Serialize};

/// Settings applied to every machine a factory launches.
///
/// Missing fields take their defaults when deserialized:
///
/// ```rust
/// use flowstate::logger::LogLevel;
/// use flowstate::machine::MachineConfig;
///
/// let config = MachineConfig::from_json(r#"{ "name": "checkout" }"#).unwrap();
/// assert_eq!(config.name, "checkout");
/// assert_eq!(config.min_log_level, LogLevel::Debug);
/// assert!(config.reuse_last_emitted_state);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Root tag of every log record.
    pub name: String,

    /// Records below this level are not built.
    pub min_log_level: LogLevel,

    /// Start the next launch from the last emitted state instead of the
    /// initial state supplier. Ignored when a custom state holder is set.
    pub reuse_last_emitted_state: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: "state_machine".to_string(),
            min_log_level: LogLevel::Debug,
            reuse_last_emitted_state: true,
        }
    }
}

impl MachineConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_min_log_level(mut self, level: LogLevel) -> Self {
        self.min_log_level = level;
        self
    }

    pub fn with_reuse_last_emitted_state(mut self, reuse: bool) -> Self {
        self.reuse_last_emitted_state = reuse;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = MachineConfig::default()
            .with_name("search")
            .with_min_log_level(LogLevel::Warn)
            .with_reuse_last_emitted_state(false);

        assert_eq!(config.name, "search");
        assert_eq!(config.min_log_level, LogLevel::Warn);
        assert!(!config.reuse_last_emitted_state);
    }

    #[test]
    fn parses_levels_in_lowercase() {
        let config = MachineConfig::from_json(
            r#"{ "name": "feed", "min_log_level": "verbose", "reuse_last_emitted_state": false }"#,
        )
        .unwrap();

        assert_eq!(config.min_log_level, LogLevel::Verbose);
        assert!(!config.reuse_last_emitted_state);
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(MachineConfig::from_json(r#"{ "min_log_level": "loud" }"#).is_err());
    }
}
