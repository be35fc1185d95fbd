use anyhow::Result;

use crate::commands::CommandReport;
use crate::config;

include!(concat!(env!("OUT_DIR"), "/chatcite_env_allowlist.rs"));

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("status");

    report.detail(format!("build={}", env!("BUILD_UUID")));

    match config::load_config() {
        Ok(cfg) => {
            report.detail(format!("request_timeout_ms={}", cfg.timeouts.request_ms));
            report.detail(format!(
                "share_probe_timeout_ms={}",
                cfg.timeouts.share_probe_ms
            ));
            report.detail(format!(
                "share_list_timeout_ms={}",
                cfg.timeouts.share_list_ms
            ));
            report.detail(format!("snapshot_timeout_ms={}", cfg.timeouts.snapshot_ms));
            report.detail(format!("hydration_wait_ms={}", cfg.hydration.wait_ms));
            report.detail(format!("hydration_poll_ms={}", cfg.hydration.poll_ms));
            report.detail(format!(
                "emulate_when_detached={}",
                cfg.snapshot.emulate_when_detached
            ));
            report.detail(format!("verbose={}", cfg.verbose));
            report.detail(format!("offline={}", cfg.offline));
        }
        Err(err) => {
            report.issue(format!("config invalid: {err}"));
        }
    }

    for key in GENERATED_CHATCITE_ENV_ALLOWLIST {
        report.detail(format!("env={key}"));
    }

    Ok(report)
}
