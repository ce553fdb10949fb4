//! Runtime configuration read from the environment

use std::path::PathBuf;

/// Behaviour switches for the state router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Clear the conversation's stored data when it finishes
    pub clear_data_on_finish: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            clear_data_on_finish: true,
        }
    }
}

/// Settings for the demo binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite file; in-memory storage when unset
    pub db_path: Option<PathBuf>,
    /// Emit JSON log lines instead of plain text
    pub json_logs: bool,
    pub router: RouterConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| lookup(name).as_deref().and_then(parse_bool).unwrap_or(false);

        Self {
            db_path: lookup("CONVFLOW_DB_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            json_logs: flag("CONVFLOW_LOG_JSON"),
            router: RouterConfig {
                clear_data_on_finish: !flag("CONVFLOW_KEEP_DATA_ON_FINISH"),
            },
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, AppConfig::default());
        assert!(config.router.clear_data_on_finish);
    }

    #[test]
    fn test_reads_variables() {
        let config = config_from(&[
            ("CONVFLOW_DB_PATH", "/tmp/flow.db"),
            ("CONVFLOW_LOG_JSON", "true"),
            ("CONVFLOW_KEEP_DATA_ON_FINISH", "1"),
        ]);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/flow.db")));
        assert!(config.json_logs);
        assert!(!config.router.clear_data_on_finish);
    }

    #[test]
    fn test_unparseable_flags_fall_back() {
        let config = config_from(&[("CONVFLOW_LOG_JSON", "maybe"), ("CONVFLOW_DB_PATH", "")]);
        assert!(!config.json_logs);
        assert_eq!(config.db_path, None);
    }
}
