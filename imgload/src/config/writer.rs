//! `ConfigFile` → commented INI text.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Renders the configuration with a comment above every key.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let assets_dir = config
        .assets
        .directory
        .as_deref()
        .map(path_to_string)
        .unwrap_or_default();

    format!(
        r#"[cache]
; Memory cache budget for decoded images (e.g. 64MB, 512KB)
memory_size = {memory_size}

[dispatcher]
; Concurrent hunts when the link type is unknown (1-64).
; Wi-Fi/Ethernet uses 4, 4G 3, 3G 2 and 2G 1 while network scanning is on.
pool_size = {pool_size}
; Milliseconds between sweeps for requests whose targets were dropped
reap_interval_ms = {reap_interval_ms}
; Retry and replay failed network loads when connectivity returns
scan_network_changes = {scan}

[network]
; Request timeout in seconds
timeout = {timeout}
user_agent = {user_agent}
; Retries after a failed network fetch
retry_count = {retry_count}

[assets]
; Root directory for asset:/// sources (leave empty to disable)
directory = {assets_dir}

[logging]
; Log each request's lifecycle (created, executing, joined, completed...)
enabled = {logging_enabled}
directory = {log_dir}
file = {log_file}
"#,
        memory_size = format_size(config.cache.memory_size),
        pool_size = config.dispatcher.pool_size,
        reap_interval_ms = config.dispatcher.reap_interval_ms,
        scan = config.dispatcher.scan_network_changes,
        timeout = config.network.timeout,
        user_agent = config.network.user_agent,
        retry_count = config.network.retry_count,
        assets_dir = assets_dir,
        logging_enabled = config.logging.enabled,
        log_dir = path_to_string(&config.logging.directory),
        log_file = config.logging.file,
    )
}

/// Collapses the home directory back to `~` for readability.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_has_every_section() {
        let text = to_config_string(&ConfigFile::default());
        for section in ["[cache]", "[dispatcher]", "[network]", "[assets]", "[logging]"] {
            assert!(text.contains(section), "missing {section}");
        }
        assert!(text.contains("memory_size = 64MB"));
        assert!(text.contains("directory = \n"));
    }

    #[test]
    fn test_home_paths_collapse_to_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("pics")), "~/pics");
        }
        assert_eq!(path_to_string(Path::new("/srv/pics")), "/srv/pics");
    }
}
