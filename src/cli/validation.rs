//! Value parsers for CLI arguments clap cannot check on its own.

use std::net::IpAddr;
use std::path::PathBuf;

const MAX_ROLLBACK_STEPS: u32 = 100;
const MAX_HOSTNAME_LEN: usize = 253;

pub fn validate_port(raw: &str) -> Result<u16, String> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err("Port must be between 1 and 65535, 0 is not allowed".to_string()),
        Ok(port) => Ok(port),
        Err(_) => Err(format!(
            "Port must be a number between 1 and 65535, got '{}'",
            raw
        )),
    }
}

/// Accepts an existing, readable regular file.
pub fn validate_config_file_path(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    let metadata = std::fs::metadata(&path)
        .map_err(|e| format!("Cannot access configuration file '{}': {}", raw, e))?;
    if !metadata.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", raw));
    }
    std::fs::File::open(&path)
        .map_err(|e| format!("Cannot read configuration file '{}': {}", raw, e))?;
    Ok(path)
}

pub fn validate_rollback_steps(raw: &str) -> Result<u32, String> {
    let steps: u32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("Rollback steps must be a positive number, got '{}'", raw))?;
    match steps {
        0 => Err("Rollback steps must be greater than 0".to_string()),
        s if s > MAX_ROLLBACK_STEPS => Err(format!(
            "Rollback steps cannot exceed {}",
            MAX_ROLLBACK_STEPS
        )),
        s => Ok(s),
    }
}

/// Accepts IPv4/IPv6 literals and RFC 1123 host names.
pub fn validate_host_address(raw: &str) -> Result<String, String> {
    let host = raw.trim();
    if host.is_empty() {
        return Err("Host address cannot be empty".to_string());
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(host.to_string());
    }
    // Dotted digits that failed to parse as an address, e.g. 999.1.1.1
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(format!("Invalid IPv4 address: '{}'", raw));
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(format!(
            "Host name is too long (maximum {} characters)",
            MAX_HOSTNAME_LEN
        ));
    }

    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if host.split('.').all(valid_label) {
        Ok(host.to_string())
    } else {
        Err(format!("Invalid host name: '{}'", raw))
    }
}
