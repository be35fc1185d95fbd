use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub request_ms: u64,
    pub share_probe_ms: u64,
    pub share_list_ms: u64,
    pub snapshot_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 7_000,
            share_probe_ms: 2_000,
            share_list_ms: 3_500,
            snapshot_ms: 9_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydrationConfig {
    pub wait_ms: u64,
    pub poll_ms: u64,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            wait_ms: 12_000,
            poll_ms: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Allow synthesizing a snapshot document for conversations that are not
    /// the currently displayed page (the batch path).
    pub emulate_when_detached: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            emulate_when_detached: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CiteConfig {
    pub timeouts: TimeoutConfig,
    pub hydration: HydrationConfig,
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialCiteConfig {
    timeouts: Option<TimeoutConfig>,
    hydration: Option<HydrationConfig>,
    snapshot: Option<SnapshotConfig>,
    verbose: Option<bool>,
    offline: Option<bool>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn validate(cfg: &CiteConfig) -> Result<()> {
    if cfg.timeouts.request_ms == 0 {
        return Err(anyhow!("invalid request timeout: must be >= 1 ms"));
    }
    if cfg.timeouts.share_probe_ms == 0 || cfg.timeouts.share_list_ms == 0 {
        return Err(anyhow!("invalid share timeouts: must be >= 1 ms"));
    }
    if cfg.timeouts.snapshot_ms == 0 {
        return Err(anyhow!("invalid snapshot timeout: must be >= 1 ms"));
    }
    if cfg.hydration.poll_ms == 0 {
        return Err(anyhow!("invalid hydration poll interval: must be >= 1 ms"));
    }
    if cfg.hydration.wait_ms < cfg.hydration.poll_ms {
        return Err(anyhow!(
            "invalid hydration window: wait ceiling must cover at least one poll"
        ));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CHATCITE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let base = dirs::config_dir().or_else(dirs::home_dir)?;
    Some(base.join("chatcite").join("chatcite.toml"))
}

fn merge_file_config(base: &mut CiteConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialCiteConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse chatcite config {}: {err}", path.display()))?;
    if let Some(timeouts) = parsed.timeouts {
        base.timeouts = timeouts;
    }
    if let Some(hydration) = parsed.hydration {
        base.hydration = hydration;
    }
    if let Some(snapshot) = parsed.snapshot {
        base.snapshot = snapshot;
    }
    if let Some(verbose) = parsed.verbose {
        base.verbose = verbose;
    }
    if let Some(offline) = parsed.offline {
        base.offline = offline;
    }
    Ok(())
}

pub fn load_config() -> Result<CiteConfig> {
    let mut cfg = CiteConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.timeouts.request_ms = env_or_u64("CHATCITE_REQUEST_TIMEOUT_MS", cfg.timeouts.request_ms);
    cfg.timeouts.share_probe_ms =
        env_or_u64("CHATCITE_SHARE_PROBE_TIMEOUT_MS", cfg.timeouts.share_probe_ms);
    cfg.timeouts.share_list_ms =
        env_or_u64("CHATCITE_SHARE_LIST_TIMEOUT_MS", cfg.timeouts.share_list_ms);
    cfg.timeouts.snapshot_ms = env_or_u64("CHATCITE_SNAPSHOT_TIMEOUT_MS", cfg.timeouts.snapshot_ms);
    cfg.hydration.wait_ms = env_or_u64("CHATCITE_HYDRATION_WAIT_MS", cfg.hydration.wait_ms);
    cfg.hydration.poll_ms = env_or_u64("CHATCITE_HYDRATION_POLL_MS", cfg.hydration.poll_ms);
    cfg.snapshot.emulate_when_detached = env_or_bool(
        "CHATCITE_EMULATE_DETACHED_SNAPSHOTS",
        cfg.snapshot.emulate_when_detached,
    );
    cfg.verbose = env_or_bool("CHATCITE_VERBOSE", cfg.verbose);
    cfg.offline = env_or_bool("CHATCITE_OFFLINE", cfg.offline);

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = CiteConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.timeouts.request_ms, 7_000);
        assert!(!cfg.snapshot.emulate_when_detached);
    }

    #[test]
    fn hydration_window_must_cover_one_poll() {
        let mut cfg = CiteConfig::default();
        cfg.hydration.wait_ms = 50;
        cfg.hydration.poll_ms = 120;
        assert!(validate(&cfg).is_err());
    }
}
