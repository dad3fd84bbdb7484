use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the image engine endpoint.
pub const ENGINE_HOST_ENV: &str = "DOCKER_HOST";

/// Environment variable requesting a TLS-verified engine connection.
pub const ENGINE_TLS_VERIFY_ENV: &str = "DOCKER_TLS_VERIFY";

/// Environment variable holding the user's roaming application-data root.
pub const APP_DATA_ENV: &str = "APPDATA";

/// Default engine endpoint for this platform.
#[cfg(windows)]
pub const DEFAULT_ENGINE_HOST: &str = "npipe:////./pipe/docker_engine";
#[cfg(not(windows))]
pub const DEFAULT_ENGINE_HOST: &str = "unix:///var/run/docker.sock";

/// Conversion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Image engine endpoint (unix://, npipe://, tcp:// or http://)
    pub engine_host: String,

    /// The operator asked for a TLS-verified engine connection
    pub engine_tls_verify: bool,

    /// Directory holding the per-run export archive
    pub work_dir: PathBuf,

    /// Parent directory of distribution storage directories
    pub install_root: PathBuf,

    /// Storage format version passed to the fast import
    pub wsl_version: u8,

    /// Repository used for per-run build tags
    pub image_repository: String,

    /// Application-data root, used for the Start Menu shortcut
    pub app_data_dir: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            engine_host: DEFAULT_ENGINE_HOST.to_string(),
            engine_tls_verify: false,
            work_dir: PathBuf::from("."),
            install_root: PathBuf::from("."),
            wsl_version: 2,
            image_repository: "tmp-image".to_string(),
            app_data_dir: None,
        }
    }
}

impl ConvertConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(ENGINE_HOST_ENV).filter(|h| !h.trim().is_empty()) {
            config.engine_host = host.trim().to_string();
        }

        config.engine_tls_verify = lookup(ENGINE_TLS_VERIFY_ENV).is_some_and(|v| !v.is_empty());

        config.app_data_dir = lookup(APP_DATA_ENV)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ConvertConfig::default();
        assert_eq!(config.engine_host, DEFAULT_ENGINE_HOST);
        assert_eq!(config.wsl_version, 2);
        assert_eq!(config.image_repository, "tmp-image");
        assert_eq!(config.work_dir, PathBuf::from("."));
        assert!(config.app_data_dir.is_none());
    }

    #[test]
    fn test_engine_host_from_env() {
        let config = ConvertConfig::from_lookup(lookup_from(&[("DOCKER_HOST", "tcp://127.0.0.1:2375")]));
        assert_eq!(config.engine_host, "tcp://127.0.0.1:2375");
    }

    #[test]
    fn test_blank_engine_host_ignored() {
        let config = ConvertConfig::from_lookup(lookup_from(&[("DOCKER_HOST", "  ")]));
        assert_eq!(config.engine_host, DEFAULT_ENGINE_HOST);
    }

    #[test]
    fn test_tls_verify_from_env() {
        assert!(!ConvertConfig::from_lookup(lookup_from(&[])).engine_tls_verify);
        assert!(!ConvertConfig::from_lookup(lookup_from(&[("DOCKER_TLS_VERIFY", "")])).engine_tls_verify);
        assert!(ConvertConfig::from_lookup(lookup_from(&[("DOCKER_TLS_VERIFY", "1")])).engine_tls_verify);
    }

    #[test]
    fn test_app_data_from_env() {
        let config = ConvertConfig::from_lookup(lookup_from(&[(
            "APPDATA",
            r"C:\Users\op\AppData\Roaming",
        )]));
        assert_eq!(
            config.app_data_dir,
            Some(PathBuf::from(r"C:\Users\op\AppData\Roaming"))
        );
    }

    #[test]
    fn test_app_data_missing() {
        let config = ConvertConfig::from_lookup(lookup_from(&[]));
        assert!(config.app_data_dir.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = ConvertConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ConvertConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.engine_host, config.engine_host);
        assert_eq!(parsed.wsl_version, config.wsl_version);
    }
}
