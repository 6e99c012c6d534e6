use super::{round_to, Host, OsFamily};
use crate::report::{ThermalReading, ThermalSensorGroup};
use std::fs;
use std::path::Path;
use sysinfo::{ComponentExt, System, SystemExt};
use tracing::debug;

/// Temperature readings grouped by sensor chip. Linux reads hwmon directly so
/// the `high`/`crit` thresholds are available; elsewhere sysinfo components are
/// used and only `critical` is known.
pub fn collect_thermal(host: &Host, system: &System) -> Vec<ThermalSensorGroup> {
    if host.os == OsFamily::Linux {
        let groups = read_hwmon(&host.paths.hwmon);
        if !groups.is_empty() {
            return groups;
        }
        debug!(path = %host.paths.hwmon.display(), "no hwmon temperatures, falling back to sysinfo");
    }
    from_components(system)
}

/// Applies the output rules for one reading: `high` is dropped when it equals
/// `critical`, and a ratio is only computed when both operands are non-zero.
pub fn build_reading(
    name: String,
    current: f64,
    high: Option<f64>,
    critical: Option<f64>,
) -> ThermalReading {
    let critical = critical.filter(|c| c.is_finite());
    let high = high
        .filter(|h| h.is_finite())
        .filter(|h| Some(*h) != critical);

    ThermalReading {
        name,
        current,
        critical,
        high,
        high_percent: ratio(current, high),
        critical_percent: ratio(current, critical),
    }
}

fn ratio(current: f64, denominator: Option<f64>) -> Option<f64> {
    let denominator = denominator.filter(|d| *d != 0.0)?;
    (current != 0.0).then(|| round_to(current / denominator, 2))
}

fn push_reading(groups: &mut Vec<ThermalSensorGroup>, group: &str, reading: ThermalReading) {
    match groups.iter_mut().find(|g| g.name == group) {
        Some(existing) => existing.entries.push(reading),
        None => groups.push(ThermalSensorGroup {
            name: group.to_string(),
            entries: vec![reading],
        }),
    }
}

fn read_hwmon(root: &Path) -> Vec<ThermalSensorGroup> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut chips: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    chips.sort();

    let mut groups = Vec::new();
    for chip in chips {
        let Some(dir_name) = chip.file_name().and_then(|v| v.to_str()) else {
            continue;
        };
        let group = read_trimmed(&chip.join("name")).unwrap_or_else(|| dir_name.to_string());

        for index in temp_indices(&chip) {
            let Some(current) = read_millidegrees(&chip.join(format!("temp{index}_input"))) else {
                continue;
            };
            let label = read_trimmed(&chip.join(format!("temp{index}_label")))
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| group.clone());
            let high = read_millidegrees(&chip.join(format!("temp{index}_max")));
            let critical = read_millidegrees(&chip.join(format!("temp{index}_crit")));
            push_reading(&mut groups, &group, build_reading(label, current, high, critical));
        }
    }
    groups
}

fn temp_indices(chip: &Path) -> Vec<u32> {
    let Ok(entries) = fs::read_dir(chip) else {
        return Vec::new();
    };
    let mut indices: Vec<u32> = entries
        .flatten()
        .filter_map(|e| {
            let name = e.file_name();
            let name = name.to_str()?;
            name.strip_prefix("temp")?
                .strip_suffix("_input")?
                .parse()
                .ok()
        })
        .collect();
    indices.sort_unstable();
    indices
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_millidegrees(path: &Path) -> Option<f64> {
    let value = read_trimmed(path)?.parse::<f64>().ok()?;
    value.is_finite().then_some(value / 1000.0)
}

fn from_components(system: &System) -> Vec<ThermalSensorGroup> {
    group_by_label(system.components().iter().map(|component| {
        (
            component.label(),
            component.temperature() as f64,
            component.critical().map(|v| v as f64),
        )
    }))
}

/// sysinfo labels carry no chip/reading split, so each label is its own group.
fn group_by_label<'a>(
    components: impl IntoIterator<Item = (&'a str, f64, Option<f64>)>,
) -> Vec<ThermalSensorGroup> {
    let mut groups = Vec::new();
    for (label, current, critical) in components {
        if !current.is_finite() {
            continue;
        }
        let label = label.trim();
        let critical = critical.filter(|v| v.is_finite());
        push_reading(
            &mut groups,
            label,
            build_reading(label.to_string(), current, None, critical),
        );
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_file;
    use std::time::Duration;

    #[test]
    fn ratios_are_rounded_to_two_decimals() {
        let r = build_reading("Package id 0".into(), 90.0, Some(92.0), Some(95.0));
        assert_eq!(r.critical_percent, Some(0.95));
        assert_eq!(r.high_percent, Some(0.98));
        assert_eq!(r.high, Some(92.0));
    }

    #[test]
    fn zero_current_produces_no_ratios() {
        let r = build_reading("Core 0".into(), 0.0, Some(80.0), Some(100.0));
        assert_eq!(r.high_percent, None);
        assert_eq!(r.critical_percent, None);
        assert_eq!(r.critical, Some(100.0));
    }

    #[test]
    fn high_equal_to_critical_is_suppressed() {
        let r = build_reading("Core 0".into(), 50.0, Some(95.0), Some(95.0));
        assert_eq!(r.high, None);
        assert_eq!(r.high_percent, None);
        assert_eq!(r.critical_percent, Some(0.53));

        let value = serde_json::to_value(&r).expect("value");
        assert!(value.get("high").is_none());
        assert!(value.get("high_percent").is_none());
    }

    #[test]
    fn high_without_critical_is_kept() {
        let r = build_reading("temp1".into(), 40.0, Some(80.0), None);
        assert_eq!(r.high, Some(80.0));
        assert_eq!(r.high_percent, Some(0.5));
        assert_eq!(r.critical_percent, None);
    }

    #[test]
    fn zero_threshold_produces_no_ratio() {
        let r = build_reading("temp1".into(), 40.0, None, Some(0.0));
        assert_eq!(r.critical, Some(0.0));
        assert_eq!(r.critical_percent, None);
    }

    #[test]
    fn component_labels_are_not_split() {
        let groups = group_by_label([
            ("CPU PECI", 55.0, Some(100.0)),
            ("CPU Proximity", 48.0, None),
            ("GPU", f64::NAN, None),
        ]);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["CPU PECI", "CPU Proximity"]);
        assert_eq!(groups[0].entries[0].name, "CPU PECI");
        assert_eq!(groups[0].entries[0].critical_percent, Some(0.55));
    }

    #[test]
    fn hwmon_tree_is_grouped_by_chip_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        write_file(&root.join("hwmon0/name"), "coretemp\n");
        write_file(&root.join("hwmon0/temp1_input"), "45000\n");
        write_file(&root.join("hwmon0/temp1_label"), "Package id 0\n");
        write_file(&root.join("hwmon0/temp1_max"), "100000\n");
        write_file(&root.join("hwmon0/temp1_crit"), "100000\n");
        write_file(&root.join("hwmon0/temp2_input"), "43000\n");
        write_file(&root.join("hwmon0/temp2_crit"), "100000\n");
        write_file(&root.join("hwmon1/name"), "acpitz\n");
        write_file(&root.join("hwmon1/temp1_input"), "27800\n");
        write_file(&root.join("hwmon2/name"), "coretemp\n");
        write_file(&root.join("hwmon2/temp1_input"), "46000\n");

        let mut host = crate::collectors::Host::current(Duration::from_secs(1));
        host.os = OsFamily::Linux;
        host.paths.hwmon = root.to_path_buf();
        let groups = collect_thermal(&host, &System::new());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "coretemp");
        assert_eq!(groups[0].entries.len(), 3);
        assert_eq!(groups[0].entries[0].name, "Package id 0");
        assert_eq!(groups[0].entries[0].high, None);
        assert_eq!(groups[0].entries[0].critical_percent, Some(0.45));
        assert_eq!(groups[0].entries[1].name, "coretemp");
        assert_eq!(groups[1].name, "acpitz");
        assert_eq!(groups[1].entries[0].current, 27.8);
        assert_eq!(groups[1].entries[0].critical, None);
    }
}
