//! Input validation for everything that crosses the HTTP boundary: stream ids,
//! source URIs, and alias names. Guards against path traversal in ids/aliases and
//! shell metacharacter injection in URIs (the transcoder command line is built from
//! the raw URI, so this is the only thing standing between an HTTP caller and
//! argument injection).

use anyhow::{anyhow, Result};

pub const MAX_ID_LENGTH: usize = 256;
pub const MAX_URI_LENGTH: usize = 4096;
pub const MAX_ALIAS_LENGTH: usize = 256;

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Stream ids and aliases must not be usable as path components beyond a single
/// segment: no path separators, no "..".
pub fn validate_id(id: &str, field_name: &str) -> Result<()> {
    validate_non_empty(id, field_name)?;
    validate_length(id, MAX_ID_LENGTH, field_name)?;
    if id.contains("..") || id.contains('/') || id.contains('\\') {
        return Err(anyhow!(
            "{} contains invalid characters (no path separators or '..' allowed)",
            field_name
        ));
    }
    Ok(())
}

pub fn validate_alias(alias: &str) -> Result<()> {
    validate_length(alias, MAX_ALIAS_LENGTH, "alias")?;
    if alias.contains("..") || alias.contains('/') || alias.contains('\\') {
        return Err(anyhow!("alias contains invalid characters (no path separators or '..' allowed)"));
    }
    Ok(())
}

/// Source URIs are passed straight onto the transcoder's command line, so shell
/// metacharacters are rejected outright rather than escaped.
pub fn validate_uri(uri: &str, field_name: &str) -> Result<()> {
    validate_non_empty(uri, field_name)?;
    validate_length(uri, MAX_URI_LENGTH, field_name)?;

    let dangerous_chars = ['`', '$', ';', '|', '&', '\n', '\r'];
    if uri.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("{} contains dangerous shell metacharacters", field_name));
    }

    if !(uri.starts_with("rtsp://") || uri.starts_with("rtsps://")) {
        return Err(anyhow!("{} must be an rtsp:// or rtsps:// URI", field_name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_id() {
        assert!(validate_id("", "id").is_err());
        assert!(validate_id("   ", "id").is_err());
    }

    #[test]
    fn rejects_path_traversal_in_id() {
        assert!(validate_id("../etc/passwd", "id").is_err());
        assert!(validate_id("a/b", "id").is_err());
        assert!(validate_id("a\\b", "id").is_err());
    }

    #[test]
    fn accepts_plain_id() {
        assert!(validate_id("front-door-1", "id").is_ok());
    }

    #[test]
    fn rejects_oversized_id() {
        let long = "a".repeat(MAX_ID_LENGTH + 1);
        assert!(validate_id(&long, "id").is_err());
    }

    #[test]
    fn rejects_shell_metacharacters_in_uri() {
        assert!(validate_uri("rtsp://cam/1; rm -rf /", "uri").is_err());
        assert!(validate_uri("rtsp://cam/$(whoami)", "uri").is_err());
    }

    #[test]
    fn rejects_non_rtsp_scheme() {
        assert!(validate_uri("http://cam/1", "uri").is_err());
    }

    #[test]
    fn accepts_plain_rtsp_uri() {
        assert!(validate_uri("rtsp://cam.local:554/1", "uri").is_ok());
    }
}
