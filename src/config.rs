use std::path::PathBuf;

use crate::limits::DEFAULT_MAX_PAGE_SIZE;

/// Policy knobs of the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Reject bookings overlapping an APPROVED booking of the same item.
    /// Off by default: availability is a flag, not a calendar.
    pub reject_overlaps: bool,
    pub max_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reject_overlaps: false,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// Process configuration, read from `LENDIT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub compact_threshold: u64,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data_dir = lookup("LENDIT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let compact_threshold = lookup("LENDIT_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compact_threshold);
        let reject_overlaps = lookup("LENDIT_REJECT_OVERLAPS")
            .map(|s| parse_flag(&s))
            .unwrap_or(defaults.engine.reject_overlaps);
        let max_page_size = lookup("LENDIT_MAX_PAGE_SIZE")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.engine.max_page_size);

        Self {
            data_dir,
            compact_threshold,
            engine: EngineConfig {
                reject_overlaps,
                max_page_size,
            },
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("lendit.wal")
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg, Config::default());
        assert!(!cfg.engine.reject_overlaps);
        assert_eq!(cfg.wal_path(), PathBuf::from("./data/lendit.wal"));
    }

    #[test]
    fn reads_all_keys() {
        let cfg = Config::from_lookup(lookup(&[
            ("LENDIT_DATA_DIR", "/var/lib/lendit"),
            ("LENDIT_COMPACT_THRESHOLD", "50"),
            ("LENDIT_REJECT_OVERLAPS", "TRUE"),
            ("LENDIT_MAX_PAGE_SIZE", "20"),
        ]));
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/lendit"));
        assert_eq!(cfg.compact_threshold, 50);
        assert!(cfg.engine.reject_overlaps);
        assert_eq!(cfg.engine.max_page_size, 20);
    }

    #[test]
    fn garbage_falls_back() {
        let cfg = Config::from_lookup(lookup(&[
            ("LENDIT_COMPACT_THRESHOLD", "lots"),
            ("LENDIT_REJECT_OVERLAPS", "maybe"),
            ("LENDIT_MAX_PAGE_SIZE", "0"),
        ]));
        assert_eq!(cfg.compact_threshold, 1000);
        assert!(!cfg.engine.reject_overlaps);
        assert_eq!(cfg.engine.max_page_size, DEFAULT_MAX_PAGE_SIZE);
    }
}
