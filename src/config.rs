use crate::core::error::{Error, Result};
use crate::core::identifier::{IDENTIFIER_LEN, IPSET_NAME_MAX};
use crate::core::policy::{FirewallBackend, LogDenied, ZoneTarget};
use crate::core::rule::MAX_ORDER;
use crate::utils::get_config_dir;
use crate::validators;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Site policy: defaults applied to rule declarations plus daemon-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Prefix for generated service names and notifications (`simp` gives `simp_<title>`)
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Prepended to every derived ipset identifier
    #[serde(default = "default_ipset_prefix")]
    pub ipset_prefix: String,
    #[serde(default = "default_zone")]
    pub default_zone: String,
    #[serde(default = "default_order")]
    pub default_order: u16,
    /// Used by rules that declare no `trusted_nets`
    #[serde(default = "default_trusted_nets")]
    pub default_trusted_nets: Vec<String>,
    #[serde(default = "default_true")]
    pub lockdown: bool,
    #[serde(default)]
    pub log_denied: LogDenied,
    #[serde(default)]
    pub firewall_backend: FirewallBackend,
    #[serde(default)]
    pub zone_target: ZoneTarget,
    #[serde(default)]
    pub zone_interfaces: Vec<String>,
    /// Remove rich rules, services, and ports from the managed zone that the catalog
    /// did not put there
    #[serde(default = "default_true")]
    pub purge: bool,
    /// Remove owned ipsets and services that no rule references anymore
    #[serde(default = "default_true")]
    pub remove_stale: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            ipset_prefix: default_ipset_prefix(),
            default_zone: default_zone(),
            default_order: default_order(),
            default_trusted_nets: default_trusted_nets(),
            lockdown: true,
            log_denied: LogDenied::default(),
            firewall_backend: FirewallBackend::default(),
            zone_target: ZoneTarget::default(),
            zone_interfaces: Vec::new(),
            purge: true,
            remove_stale: true,
        }
    }
}

fn default_namespace() -> String {
    "simp".to_string()
}

fn default_ipset_prefix() -> String {
    "simp-".to_string()
}

fn default_zone() -> String {
    "99_simp".to_string()
}

fn default_order() -> u16 {
    11
}

fn default_trusted_nets() -> Vec<String> {
    vec!["127.0.0.1".to_string(), "::1".to_string()]
}

fn default_true() -> bool {
    true
}

impl PolicyConfig {
    /// Prefix of every generated custom service name
    pub fn service_prefix(&self) -> String {
        format!("{}_", self.namespace)
    }

    /// Checks that the configuration can produce names firewalld accepts.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - the namespace is empty or not made of `[A-Za-z0-9_]`
    /// - the ipset prefix plus a full identifier exceeds 31 characters
    /// - the default zone name is invalid
    /// - the default order is above 32767
    /// - an interface name is empty or contains whitespace
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty()
            || !self
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(format!(
                "namespace '{}' must be non-empty and use only letters, digits, and _",
                self.namespace
            )));
        }

        if self.ipset_prefix.len() + IDENTIFIER_LEN > IPSET_NAME_MAX {
            return Err(Error::Config(format!(
                "ipset_prefix '{}' is too long: at most {} characters leave room for the identifier",
                self.ipset_prefix,
                IPSET_NAME_MAX - IDENTIFIER_LEN
            )));
        }
        if !self
            .ipset_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        {
            return Err(Error::Config(format!(
                "ipset_prefix '{}' may only contain letters, digits, - and _",
                self.ipset_prefix
            )));
        }

        validators::validate_zone_name(&self.default_zone)
            .map_err(|e| Error::Config(format!("default_zone: {e}")))?;

        if i64::from(self.default_order) > MAX_ORDER {
            return Err(Error::Config(format!(
                "default_order {} must be at most {MAX_ORDER}",
                self.default_order
            )));
        }

        for iface in &self.zone_interfaces {
            validators::validate_interface(iface)
                .map_err(|e| Error::Config(format!("zone_interfaces: {e}")))?;
        }

        Ok(())
    }
}

/// Location of the per-user configuration file
pub fn default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads the policy configuration.
///
/// An explicit `path` must exist and parse. Without one, the per-user config file is
/// used if present, and the built-in defaults otherwise.
///
/// # Errors
///
/// Returns `Err` if an explicit file cannot be read, any file fails to parse, or the
/// result fails [`PolicyConfig::validate`].
///
/// # Async
/// Uses `tokio::fs` for non-blocking I/O.
pub async fn load_config(path: Option<&Path>) -> Result<PolicyConfig> {
    let config = match path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<PolicyConfig>(&json)?
        }
        None => match default_config_path() {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                tracing::debug!("Loading configuration from {}", path.display());
                let json = tokio::fs::read_to_string(&path).await?;
                serde_json::from_str::<PolicyConfig>(&json)?
            }
            _ => PolicyConfig::default(),
        },
    };

    config.validate()?;
    Ok(config)
}

/// Saves the configuration to the per-user config file.
///
/// Returns the path written.
///
/// # Errors
///
/// Returns `Err` if no config directory can be determined or the write fails.
///
/// # Security
///
/// On Unix systems, the file is created with mode 0o600 (user read/write only).
pub async fn save_config(config: &PolicyConfig) -> Result<PathBuf> {
    let path = default_config_path().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no home directory to place the config file in",
        ))
    })?;

    if let Some(dir) = path.parent() {
        crate::utils::ensure_dir(dir)?;
    }

    let json = serde_json::to_string_pretty(config)?;
    save_to(&path, &json).await?;
    Ok(path)
}

/// Atomic write pattern: temp file with restrictive permissions, fsync, rename.
async fn save_to(path: &Path, json: &str) -> std::io::Result<()> {
    let temp_path = path.with_extension("json.tmp");

    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot save configuration. Free up space and try again.",
            )
        } else {
            e
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        PolicyConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: PolicyConfig =
            serde_json::from_str(r#"{"default_zone": "public", "log_denied": "all"}"#).unwrap();
        assert_eq!(config.default_zone, "public");
        assert_eq!(config.log_denied, LogDenied::All);
        assert_eq!(config.namespace, "simp");
        assert_eq!(config.default_order, 11);
        assert!(config.lockdown);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_json::from_str::<PolicyConfig>(r#"{"defualt_zone": "x"}"#).is_err());
    }

    #[test]
    fn test_long_ipset_prefix_rejected() {
        let config = PolicyConfig {
            ipset_prefix: "toolong-".to_string(),
            ..PolicyConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = PolicyConfig {
            ipset_prefix: "site-".to_string(),
            ..PolicyConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_namespace_rejected() {
        for namespace in ["", "my site", "a-b"] {
            let config = PolicyConfig {
                namespace: namespace.to_string(),
                ..PolicyConfig::default()
            };
            assert!(config.validate().is_err(), "{namespace:?}");
        }
    }

    #[test]
    fn test_default_order_bound() {
        let config = PolicyConfig {
            default_order: 40_000,
            ..PolicyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_service_prefix() {
        assert_eq!(PolicyConfig::default().service_prefix(), "simp_");
    }

    #[tokio::test]
    async fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, r#"{"lockdown": false, "zone_interfaces": ["eth0"]}"#).unwrap();

        let config = load_config(Some(&path)).await.unwrap();
        assert!(!config.lockdown);
        assert_eq!(config.zone_interfaces, vec!["eth0"]);
    }

    #[tokio::test]
    async fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.json"))).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_save_to_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_to(&path, "{}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
