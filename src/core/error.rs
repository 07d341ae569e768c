use thiserror::Error;

/// Core error types for simpfw
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A trusted network token is not a valid address, CIDR, or hostname
    #[error("Invalid address '{token}' in rule '{rule}': {reason}")]
    InvalidAddress {
        rule: String,
        token: String,
        reason: String,
    },

    /// A rule declaration failed validation
    #[error("Invalid rule '{rule}': {message}")]
    InvalidRuleSpec { rule: String, message: String },

    /// The policy configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid_rule(rule: &str, message: impl Into<String>) -> Self {
        Self::InvalidRuleSpec {
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    /// Title of the rule declaration that failed, if the error is tied to one.
    pub fn rule_title(&self) -> Option<&str> {
        match self {
            Self::InvalidAddress { rule, .. } | Self::InvalidRuleSpec { rule, .. } => Some(rule),
            Self::Io(_) | Self::Serialization(_) | Self::Config(_) => None,
        }
    }
}

/// Classifier failure before the owning rule is known.
///
/// Converted into [`Error::InvalidAddress`] once the rule title is attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address '{token}': {reason}")]
pub struct AddressError {
    pub token: String,
    pub reason: String,
}

impl AddressError {
    pub fn new(token: &str, reason: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    pub fn in_rule(self, rule: &str) -> Error {
        Error::InvalidAddress {
            rule: rule.to_string(),
            token: self.token,
            reason: self.reason,
        }
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub help_url: Option<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
            help_url: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

impl Error {
    /// Returns a user-facing explanation of the error with suggestions for fixing the
    /// offending declaration.
    pub fn translate(&self) -> ErrorTranslation {
        match self {
            Self::InvalidAddress { rule, token, .. } => {
                ErrorTranslation::new(format!("Rule '{rule}' lists an invalid network '{token}'"))
                    .with_suggestion("Use proper IP format: 192.168.1.1 or 192.168.1.0/24")
                    .with_suggestion("For IPv6: 2001:db8::1 or 2001:db8::/32")
                    .with_suggestion("Prefix length must be 0-32 for IPv4 and 0-128 for IPv6")
                    .with_help("https://en.wikipedia.org/wiki/Classless_Inter-Domain_Routing")
            }
            Self::InvalidRuleSpec { rule, message } => {
                let lower = message.to_lowercase();
                let translation = ErrorTranslation::new(format!("Rule '{rule}' is invalid: {message}"));

                if lower.contains("does not use ports") {
                    translation
                        .with_suggestion("Remove 'dports' from rules using ah, esp, icmp, or all")
                        .with_suggestion("Use protocol 'tcp' or 'udp' when matching ports")
                } else if lower.contains("port") {
                    translation
                        .with_suggestion("Port numbers must be between 1 and 65535")
                        .with_suggestion("Ranges are written '1000:2000' with start <= end")
                } else if lower.contains("apply_to") {
                    translation.with_suggestion("apply_to must be one of: any, ipv4, ipv6")
                } else if lower.contains("zone") {
                    translation
                        .with_suggestion("Zone names use only a-z, 0-9, _ and - (max 17 chars)")
                        .with_help("https://firewalld.org/documentation/zone/")
                } else if lower.contains("duplicate") {
                    translation.with_suggestion("Every rule title must be unique in a document")
                } else {
                    translation
                        .with_suggestion("Check the rule declaration for typos")
                        .with_help("https://firewalld.org/documentation/man-pages/firewalld.richlanguage.html")
                }
            }
            Self::Io(e) => ErrorTranslation::new(format!("File access failed: {e}"))
                .with_suggestion("Check that the path exists and is readable"),
            Self::Config(message) => ErrorTranslation::new(format!("Configuration rejected: {message}"))
                .with_suggestion("Run 'simpfw policy' to print the effective configuration")
                .with_suggestion("The ipset prefix plus 26 characters must fit in 31"),
            Self::Serialization(e) => ErrorTranslation::new(format!("Malformed JSON: {e}"))
                .with_suggestion("Rule documents are {\"rules\": [...]} or a bare array")
                .with_suggestion("Check for missing quotes, brackets, or commas"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_error_attaches_rule() {
        let err = AddressError::new("1.2.3.4/33", "prefix out of range").in_rule("allow_ssh");
        assert_eq!(err.rule_title(), Some("allow_ssh"));
        assert!(err.to_string().contains("1.2.3.4/33"));
        assert!(err.to_string().contains("allow_ssh"));
    }

    #[test]
    fn test_portless_translation() {
        let err = Error::invalid_rule("allow_ah", "protocol 'ah' does not use ports");
        let translation = err.translate();
        assert!(translation.user_message.contains("allow_ah"));
        assert!(
            translation
                .suggestions
                .iter()
                .any(|s| s.contains("tcp"))
        );
    }

    #[test]
    fn test_port_translation() {
        let err = Error::invalid_rule("web", "port range 90:80 is reversed");
        let translation = err.translate();
        assert!(translation.suggestions.iter().any(|s| s.contains("65535")));
    }

    #[test]
    fn test_address_translation_has_help() {
        let err = AddressError::new("300.1.1.1", "octet out of range").in_rule("x");
        let translation = err.translate();
        assert!(translation.help_url.is_some());
        assert!(translation.suggestions.len() >= 3);
    }

    #[test]
    fn test_io_has_no_rule() {
        let err = Error::from(std::io::Error::other("boom"));
        assert_eq!(err.rule_title(), None);
    }
}
