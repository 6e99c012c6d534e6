use crate::command::CommandRunner;
use crate::report::{SecurityExposure, ServiceUnit, SystemdInfo};
use tracing::warn;

/// Unit listings plus the security assessment. Only meaningful when the host
/// runs systemd; see [`crate::collectors::Host::runs_systemd`].
pub async fn collect_systemd(runner: &CommandRunner) -> SystemdInfo {
    SystemdInfo {
        running: list_units(runner, "running").await,
        exited: list_units(runner, "exited").await,
        failed: list_units(runner, "failed").await,
        security: security_assessment(runner).await,
    }
}

async fn list_units(runner: &CommandRunner, state: &str) -> Vec<ServiceUnit> {
    let state_arg = format!("--state={state}");
    let args = [
        "list-units",
        state_arg.as_str(),
        "--plain",
        "--no-legend",
        "--no-pager",
    ];
    match runner.run("systemctl", &args).await {
        Ok(out) => parse_units(&out.text()),
        Err(err) => {
            warn!(state, error = %err, "systemctl list-units failed");
            Vec::new()
        }
    }
}

async fn security_assessment(runner: &CommandRunner) -> Option<Vec<SecurityExposure>> {
    let out = match runner
        .run("systemd-analyze", &["security", "--json=short", "--no-pager"])
        .await
    {
        Ok(out) => out,
        Err(err) => {
            warn!(error = %err, "systemd-analyze security failed");
            return None;
        }
    };
    match serde_json::from_slice(&out.stdout) {
        Ok(entries) => Some(entries),
        Err(err) => {
            warn!(error = %err, "systemd-analyze security output is not valid JSON");
            None
        }
    }
}

/// Parses `systemctl list-units --plain --no-legend` output. Lines with fewer
/// than five fields are dropped.
pub fn parse_units(text: &str) -> Vec<ServiceUnit> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(ServiceUnit {
                unit: fields[0].to_string(),
                load: fields[1].to_string(),
                active: fields[2].to_string(),
                sub: fields[3].to_string(),
                description: fields[4..].join(" "),
            })
        })
        .collect()
}
