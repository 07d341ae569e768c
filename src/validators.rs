//! Input validation and sanitization functions for simpfw
//!
//! This module centralizes checks on everything a rule document or config file can
//! put into a firewalld object name, and the quoting used when those names end up in
//! a shell script.

/// Longest zone name firewalld accepts
pub const MAX_ZONE_NAME_LEN: usize = 17;

/// Longest rule title accepted
pub const MAX_TITLE_LEN: usize = 64;

/// Validates a rule title.
///
/// Titles appear in rich-rule resource names and, sanitized, in custom service
/// names.
///
/// # Errors
///
/// Returns `Err` if:
/// - Title is empty or longer than 64 characters
/// - Title contains control characters or quotes
/// - Title has no character usable in a service name
///
/// # Examples
///
/// ```
/// use simpfw::validators::validate_title;
///
/// assert!(validate_title("allow_tcp_listen").is_ok());
/// assert!(validate_title("allow ssh from bastion").is_ok());
/// assert!(validate_title("").is_err());
/// assert!(validate_title("bad\"title").is_err());
/// ```
pub fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title must not be empty".to_string());
    }

    if title.len() > MAX_TITLE_LEN {
        return Err(format!("title too long (max {MAX_TITLE_LEN} characters)"));
    }

    // SECURITY: ASCII-only keeps titles out of Unicode normalization games
    if let Some(bad) = title
        .chars()
        .find(|c| !(c.is_ascii_graphic() || *c == ' ') || matches!(*c, '"' | '\'' | '`' | '\\'))
    {
        return Err(format!("title contains invalid character {bad:?}"));
    }

    if !title.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err("title must contain at least one letter or digit".to_string());
    }

    Ok(())
}

/// Maps a rule title onto the characters firewalld allows in service names.
///
/// Letters, digits, `_`, and `-` are kept; everything else becomes `_`.
///
/// # Examples
///
/// ```
/// use simpfw::validators::sanitize_service_name;
///
/// assert_eq!(sanitize_service_name("allow_tcp_listen"), "allow_tcp_listen");
/// assert_eq!(sanitize_service_name("allow ssh:bastion"), "allow_ssh_bastion");
/// ```
pub fn sanitize_service_name(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Validates a firewalld zone name.
///
/// # Errors
///
/// Returns `Err` if the name is empty, longer than 17 characters, or contains
/// anything but letters, digits, `_`, and `-`.
pub fn validate_zone_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("zone name must not be empty".to_string());
    }

    if name.len() > MAX_ZONE_NAME_LEN {
        return Err(format!(
            "zone name '{name}' too long (max {MAX_ZONE_NAME_LEN} characters)"
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
    {
        return Err(format!("zone name '{name}' contains invalid characters"));
    }

    Ok(())
}

/// Validates a single port number.
///
/// # Errors
///
/// Returns `Err` if port is 0 (reserved).
pub fn validate_port(port: u16) -> Result<u16, String> {
    if port == 0 {
        Err("Port must be between 1 and 65535".to_string())
    } else {
        Ok(port)
    }
}

/// Validates a port range.
///
/// # Errors
///
/// Returns `Err` if:
/// - Either port is 0
/// - Start port is greater than end port
pub fn validate_port_range(start: u16, end: u16) -> Result<(u16, u16), String> {
    validate_port(start)?;
    validate_port(end)?;

    if start > end {
        Err("Start port must be less than or equal to end port".to_string())
    } else {
        Ok((start, end))
    }
}

/// Validates a network interface name.
///
/// Linux kernel interface name rules:
/// - Max 15 characters (IFNAMSIZ - 1)
/// - Alphanumeric, dot, dash, underscore only
/// - Cannot be "." or ".."
///
/// # Errors
///
/// Returns `Err` if interface name violates kernel constraints.
pub fn validate_interface(name: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err("Interface name must not be empty".to_string());
    }

    if name.len() > 15 {
        return Err("Interface name too long (max 15 characters)".to_string());
    }

    if name == "." || name == ".." {
        return Err("Invalid interface name".to_string());
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err("Interface name contains invalid characters".to_string());
    }

    Ok(name.to_string())
}

/// Quotes a word for POSIX `sh`.
///
/// Words made only of safe characters pass through unchanged; anything else is
/// wrapped in single quotes with embedded quotes escaped.
///
/// # Examples
///
/// ```
/// use simpfw::validators::shell_quote;
///
/// assert_eq!(shell_quote("--zone=99_simp"), "--zone=99_simp");
/// assert_eq!(shell_quote("rule family=\"ipv4\" accept"), "'rule family=\"ipv4\" accept'");
/// assert_eq!(shell_quote("it's"), "'it'\\''s'");
/// ```
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ','));

    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}
