//! INI → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields. Parsing
//! starts from `ConfigFile::default()` and overlays what the file sets;
//! unknown sections and keys are ignored.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::{MAX_POOL_SIZE, MIN_REAP_INTERVAL_MS};
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size = parse_size(v).map_err(|_| {
                invalid("cache", "memory_size", v, "expected format like '64MB' or '512KB'")
            })?;
        }
    }

    if let Some(section) = ini.section(Some("dispatcher")) {
        if let Some(pool_size) = parse_number::<usize>(
            section,
            "dispatcher",
            "pool_size",
            "must be a positive integer",
        )? {
            if pool_size == 0 || pool_size > MAX_POOL_SIZE {
                return Err(invalid(
                    "dispatcher",
                    "pool_size",
                    &pool_size.to_string(),
                    &format!("must be between 1 and {}", MAX_POOL_SIZE),
                ));
            }
            config.dispatcher.pool_size = pool_size;
        }
        if let Some(interval) = parse_number::<u64>(
            section,
            "dispatcher",
            "reap_interval_ms",
            "must be a positive integer (milliseconds)",
        )? {
            if interval < MIN_REAP_INTERVAL_MS {
                return Err(invalid(
                    "dispatcher",
                    "reap_interval_ms",
                    &interval.to_string(),
                    &format!("must be at least {}", MIN_REAP_INTERVAL_MS),
                ));
            }
            config.dispatcher.reap_interval_ms = interval;
        }
        if let Some(v) = section.get("scan_network_changes") {
            config.dispatcher.scan_network_changes =
                parse_bool(v).ok_or_else(|| invalid_bool("dispatcher", "scan_network_changes", v))?;
        }
    }

    if let Some(section) = ini.section(Some("network")) {
        if let Some(timeout) = parse_number::<u64>(
            section,
            "network",
            "timeout",
            "must be a positive integer (seconds)",
        )? {
            if timeout == 0 {
                return Err(invalid("network", "timeout", "0", "must be at least 1"));
            }
            config.network.timeout = timeout;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.network.user_agent = v.to_string();
            }
        }
        if let Some(retries) = parse_number::<u32>(
            section,
            "network",
            "retry_count",
            "must be a non-negative integer",
        )? {
            config.network.retry_count = retries;
        }
    }

    if let Some(section) = ini.section(Some("assets")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.assets.directory = Some(expand_tilde(v));
            }
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("enabled") {
            config.logging.enabled =
                parse_bool(v).ok_or_else(|| invalid_bool("logging", "enabled", v))?;
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_bool(section: &str, key: &str, value: &str) -> ConfigFileError {
    invalid(section, key, value, "must be true/false, yes/no, on/off, or 1/0")
}

fn parse_number<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section_name, key, v, reason)),
    }
}

/// Parses true/false, yes/no, on/off, 1/0 (case-insensitive).
pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, content).unwrap();
        ConfigFile::load_from(&path)
    }

    #[test]
    fn test_full_config() {
        let config = load(
            r#"
[cache]
memory_size = 128MB

[dispatcher]
pool_size = 6
reap_interval_ms = 250
scan_network_changes = no

[network]
timeout = 30
user_agent = gallery/2.1
retry_count = 5

[assets]
directory = /opt/app/assets

[logging]
enabled = yes
directory = /var/log/gallery
file = loader.log
"#,
        )
        .unwrap();

        assert_eq!(config.cache.memory_size, 128 * 1024 * 1024);
        assert_eq!(config.dispatcher.pool_size, 6);
        assert_eq!(config.dispatcher.reap_interval_ms, 250);
        assert!(!config.dispatcher.scan_network_changes);
        assert_eq!(config.network.timeout, 30);
        assert_eq!(config.network.user_agent, "gallery/2.1");
        assert_eq!(config.network.retry_count, 5);
        assert_eq!(config.assets.directory, Some(PathBuf::from("/opt/app/assets")));
        assert!(config.logging.enabled);
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/gallery"));
        assert_eq!(config.logging.file, "loader.log");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load("[network]\nretry_count = 0\n").unwrap();
        let default = ConfigFile::default();

        assert_eq!(config.network.retry_count, 0);
        assert_eq!(config.network.timeout, default.network.timeout);
        assert_eq!(config.cache, default.cache);
        assert_eq!(config.dispatcher, default.dispatcher);
    }

    #[test]
    fn test_invalid_memory_size() {
        let err = load("[cache]\nmemory_size = plenty\n").unwrap_err();
        assert!(err.to_string().contains("cache.memory_size"));
    }

    #[test]
    fn test_pool_size_bounds() {
        assert!(load("[dispatcher]\npool_size = 0\n").is_err());
        assert!(load("[dispatcher]\npool_size = 65\n").is_err());
        assert!(load("[dispatcher]\npool_size = four\n").is_err());
        assert_eq!(
            load("[dispatcher]\npool_size = 64\n").unwrap().dispatcher.pool_size,
            64
        );
    }

    #[test]
    fn test_reap_interval_floor() {
        let err = load("[dispatcher]\nreap_interval_ms = 10\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { key, .. } => assert_eq!(key, "reap_interval_ms"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_bool() {
        let err = load("[logging]\nenabled = maybe\n").unwrap_err();
        assert!(err.to_string().contains("logging.enabled"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(load("[network]\ntimeout = 0\n").is_err());
    }

    #[test]
    fn test_parse_bool_values() {
        for v in ["true", "TRUE", "yes", "On", "1"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "No", "off", "0"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("sometimes"), None);
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/assets"), home.join("assets"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
