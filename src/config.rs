//! Configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:8080"
//! shutdown_grace_secs = 5
//!
//! [router]
//! recover_panics = true
//!
//! [assets]
//! static_prefix = "/static"
//! static_dir = "public"
//! templates_dir = "templates"
//! watch = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub router: RouterConfig,
    pub assets: AssetsConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub addr: String,
    /// How long in-flight requests may run after a shutdown signal before
    /// their connections are closed.
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: "127.0.0.1:8080".to_owned(), shutdown_grace_secs: 5 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Put [`Recovery`](crate::middleware::Recovery) at the head of every
    /// route's chain.
    pub recover_panics: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { recover_panics: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetsConfig {
    pub static_prefix: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
    /// Watch the static and template directories for changes.
    pub watch: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.addr, "127.0.0.1:8080");
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(5));
        assert!(config.router.recover_panics);
        assert!(!config.assets.watch);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            addr = "0.0.0.0:9000"

            [router]
            recover_panics = false

            [assets]
            static_prefix = "/static"
            static_dir = "public"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.addr, "0.0.0.0:9000");
        assert_eq!(config.server.shutdown_grace_secs, 5);
        assert!(!config.router.recover_panics);
        assert_eq!(config.assets.static_prefix.as_deref(), Some("/static"));
        assert_eq!(config.assets.static_dir, Some(PathBuf::from("public")));
        assert_eq!(config.assets.templates_dir, None);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(Config::from_toml_str("[server"), Err(Error::Config(_))));
        assert!(matches!(
            Config::from_toml_str("[server]\nshutdown_grace_secs = \"soon\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hawkwing.toml");
        std::fs::write(&path, "[server]\nshutdown_grace_secs = 1\n").unwrap();

        assert_eq!(Config::load(&path).unwrap().server.shutdown_grace_secs, 1);
        assert!(matches!(Config::load(dir.path().join("missing.toml")), Err(Error::Io(_))));
    }
}
