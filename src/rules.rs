use crate::collectors::os_release::OsRelease;
use crate::collectors::OsFamily;
use crate::config::RulesConfig;
use crate::report::{Problem, ProblemClass, SystemdInfo, ThermalSensorGroup};

/// Everything the rules may look at, collected before any rule runs.
#[derive(Debug, Clone, Copy)]
pub struct Facts<'a> {
    pub os: OsFamily,
    pub release: Option<&'a OsRelease>,
    pub runs_systemd: bool,
    pub thermal: &'a [ThermalSensorGroup],
    pub systemd: Option<&'a SystemdInfo>,
    pub cpu_percent: Option<f64>,
}

pub struct Rule {
    pub name: &'static str,
    pub evaluate: fn(&Facts<'_>, &RulesConfig) -> Vec<Problem>,
}

/// Evaluation order, which is also the order problems appear in the report.
pub const RULES: &[Rule] = &[
    Rule {
        name: "unstable-distro",
        evaluate: unstable_distro,
    },
    Rule {
        name: "legacy-init",
        evaluate: legacy_init,
    },
    Rule {
        name: "overheat",
        evaluate: overheat,
    },
    Rule {
        name: "failed-units",
        evaluate: failed_units,
    },
    Rule {
        name: "unsafe-units",
        evaluate: unsafe_units,
    },
    Rule {
        name: "cpu-overload",
        evaluate: cpu_overload,
    },
];

pub fn evaluate(facts: &Facts<'_>, cfg: &RulesConfig) -> Vec<Problem> {
    RULES
        .iter()
        .filter(|rule| cfg.is_enabled(rule.name))
        .flat_map(|rule| (rule.evaluate)(facts, cfg))
        .collect()
}

fn problem(class: ProblemClass, id: &'static str, header: String, desc: String) -> Problem {
    Problem {
        class,
        id,
        header,
        desc,
    }
}

fn unstable_distro(facts: &Facts<'_>, cfg: &RulesConfig) -> Vec<Problem> {
    let Some(distro) = facts.release.and_then(OsRelease::display_name) else {
        return Vec::new();
    };
    let distro = distro.to_lowercase();
    // Last match wins when several entries occur in the name.
    let Some(found) = cfg
        .distro_denylist
        .iter()
        .map(|d| d.to_lowercase())
        .filter(|d| distro.contains(d.as_str()))
        .last()
    else {
        return Vec::new();
    };

    vec![problem(
        ProblemClass::Warning,
        "warning-shitty-linux-distro",
        "Unstable Linux distribution".to_string(),
        format!(
            "An unstable Linux distribution was detected ({found}). Its behavior is unpredictable and it is not recommended for any kind of usage."
        ),
    )]
}

fn legacy_init(facts: &Facts<'_>, _cfg: &RulesConfig) -> Vec<Problem> {
    if facts.os != OsFamily::Linux || facts.runs_systemd {
        return Vec::new();
    }
    vec![problem(
        ProblemClass::Warning,
        "warning-legacy-init-system",
        "Legacy init system".to_string(),
        "Running Linux, but init system is not systemd. Install systemd to improve system stability, security and convenience.".to_string(),
    )]
}

fn overheat(facts: &Facts<'_>, cfg: &RulesConfig) -> Vec<Problem> {
    let mut out = Vec::new();
    for group in facts.thermal {
        for entry in &group.entries {
            let (Some(ratio), Some(critical)) = (entry.critical_percent, entry.critical) else {
                continue;
            };
            let (class, id, severity) = if ratio > cfg.overheat_alert_ratio {
                (ProblemClass::Alert, "alert-overheat", "critical")
            } else if ratio > cfg.overheat_warning_ratio {
                (ProblemClass::Warning, "warning-overheat", "severe")
            } else {
                continue;
            };
            out.push(problem(
                class,
                id,
                format!("{} {} {severity} overheating", group.name, entry.name),
                format!(
                    "Temperature of {} {} is {}, critical temperature is {} ({:.1}%)",
                    group.name,
                    entry.name,
                    entry.current,
                    critical,
                    ratio * 100.0
                ),
            ));
        }
    }
    out
}

fn failed_units(facts: &Facts<'_>, _cfg: &RulesConfig) -> Vec<Problem> {
    let Some(systemd) = facts.systemd else {
        return Vec::new();
    };
    systemd
        .failed
        .iter()
        .map(|unit| {
            problem(
                ProblemClass::Warning,
                "warning-systemd-unit-failed",
                format!("{} failed", unit.unit),
                format!("systemd unit {} has failed.", unit.unit),
            )
        })
        .collect()
}

fn unsafe_units(facts: &Facts<'_>, _cfg: &RulesConfig) -> Vec<Problem> {
    let Some(security) = facts.systemd.and_then(|s| s.security.as_ref()) else {
        return Vec::new();
    };
    security
        .iter()
        .filter(|entry| entry.predicate == "UNSAFE")
        .map(|entry| {
            let exposure = entry
                .exposure_level()
                .map(|e| format!("{e:.1}"))
                .unwrap_or_else(|| "unknown".to_string());
            problem(
                ProblemClass::Notice,
                "notice-systemd-unit-unsafe",
                format!("{} is unsafe", entry.unit),
                format!(
                    "systemd unit {} has an exposure level of {exposure} out of 10. Consider sandboxing it.",
                    entry.unit
                ),
            )
        })
        .collect()
}

/// Compared as-is against the 0..100 sampler output.
fn cpu_overload(facts: &Facts<'_>, cfg: &RulesConfig) -> Vec<Problem> {
    match facts.cpu_percent {
        Some(percent) if percent > cfg.cpu_overload_threshold => vec![problem(
            ProblemClass::Notice,
            "notice-cpu-overload",
            "CPU overload".to_string(),
            format!("CPU load is {percent}%. The system may be unresponsive."),
        )],
        _ => Vec::new(),
    }
}
