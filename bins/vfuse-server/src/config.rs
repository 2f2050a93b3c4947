use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vfuse_fs::RelayConfig;
use vfuse_logging::LogConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the peer connects to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Where the relay filesystem is mounted.
    #[serde(default)]
    pub mountpoint: Option<PathBuf>,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7070))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            mountpoint: None,
            relay: RelayConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `path`, or fall back to defaults when the file is missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ServerConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.listen.port(), 7070);
    }

    #[test]
    fn test_load_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
listen = "0.0.0.0:9000"
mountpoint = "/mnt/relay"

[relay]
request_timeout = 2.5
root_mode = 0o700

[log]
level = "debug"
"#
        )
        .unwrap();

        let cfg = ServerConfig::load_or_default(file.path()).unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(cfg.mountpoint, Some(PathBuf::from("/mnt/relay")));
        assert_eq!(cfg.relay.request_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.relay.root_mode, 0o700);
        assert_eq!(cfg.relay.block_size, 1024);
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = 12").unwrap();
        assert!(ServerConfig::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_default_dump_parses_back() {
        let text = ServerConfig::default().to_toml().unwrap();
        let back: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, ServerConfig::default());
    }
}
