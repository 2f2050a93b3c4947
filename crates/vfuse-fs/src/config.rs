//! Relay filesystem configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::StatFs;

/// Settings for [`RelayFs`](crate::RelayFs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Upper bound on any single relayed call, in seconds. `0` disables it.
    #[serde(default = "default_request_timeout", with = "humantime_compat")]
    pub request_timeout: Duration,

    /// Permission bits reported for the mount root.
    #[serde(default = "default_root_mode")]
    pub root_mode: u32,

    /// Block size used for `blksize` and the block count in attributes.
    #[serde(default = "default_block_size")]
    pub block_size: u32,

    /// Values reported by `statfs`. Nothing is measured.
    #[serde(default)]
    pub statfs: StatFsConfig,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_root_mode() -> u32 {
    0o755
}

fn default_block_size() -> u32 {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            root_mode: default_root_mode(),
            block_size: default_block_size(),
            statfs: StatFsConfig::default(),
        }
    }
}

impl RelayConfig {
    /// `None` when the timeout is disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout.is_zero() {
            None
        } else {
            Some(self.request_timeout)
        }
    }
}

/// Constant filesystem statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatFsConfig {
    pub bsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub namelen: u32,
}

impl Default for StatFsConfig {
    fn default() -> Self {
        let blocks = 1_000_000;
        Self {
            bsize: 1024,
            blocks,
            bfree: blocks / 2,
            bavail: blocks / 2,
            files: 1000,
            ffree: 998,
            namelen: 255,
        }
    }
}

impl From<&StatFsConfig> for StatFs {
    fn from(c: &StatFsConfig) -> Self {
        StatFs {
            bsize: c.bsize,
            blocks: c.blocks,
            bfree: c.bfree,
            bavail: c.bavail,
            files: c.files,
            ffree: c.ffree,
            namelen: c.namelen,
        }
    }
}

/// Serde helper: `Duration` as floating-point seconds.
mod humantime_compat {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.root_mode, 0o755);
        assert_eq!(cfg.block_size, 1024);
        assert_eq!(cfg.statfs.bfree, 500_000);
        assert_eq!(cfg.statfs.ffree, 998);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg = toml::from_str::<RelayConfig>("").unwrap();
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let cfg = toml::from_str::<RelayConfig>(
            r#"
            request_timeout = 2.5

            [statfs]
            files = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.statfs.files, 10);
        assert_eq!(cfg.statfs.bsize, 1024);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let cfg = toml::from_str::<RelayConfig>("request_timeout = 0.0").unwrap();
        assert_eq!(cfg.request_timeout(), None);
    }

    #[test]
    fn test_negative_timeout_rejected() {
        assert!(toml::from_str::<RelayConfig>("request_timeout = -1.0").is_err());
    }

    #[test]
    fn test_serialize_roundtrip_through_toml() {
        let cfg = RelayConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        assert!(text.contains("request_timeout = 30.0"));
        assert_eq!(toml::from_str::<RelayConfig>(&text).unwrap(), cfg);
    }
}
