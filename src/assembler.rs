use crate::collectors::os_release::OsRelease;
use crate::collectors::packages::{self, PACKAGE_MANAGERS};
use crate::collectors::{cpu_load, devices, system, systemd, thermal, Host};
use crate::config::Config;
use crate::report::{Report, Sensors, SystemInfo};
use crate::rules::{self, Facts};
use sysinfo::{System, SystemExt};
use tracing::{debug, warn};

/// Runs every collector once, then the rules, and returns the finished report.
/// `progress` receives the human-readable stage lines.
pub async fn collect_report(host: &Host, cfg: &Config, progress: impl Fn(&str)) -> Report {
    let sampler = cpu_load::spawn_sampler(cfg.cpu_sample_interval);

    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();
    sys.refresh_disks_list();
    sys.refresh_components_list();

    let release = match OsRelease::load(&host.paths.os_release) {
        Ok(release) => Some(release),
        Err(err) => {
            debug!(error = %err, "os-release not available");
            None
        }
    };
    let libc = system::collect_libc(host).await;
    let identity = system::os_identity(host.os, &sys, release.as_ref(), libc);
    let mut cpu = system::collect_cpu(host, &sys).await;

    let pci = devices::collect_pci(&host.runner).await;
    let usb = devices::collect_usb(&host.runner).await;
    let block_devices = devices::collect_block_devices(&host.runner).await;
    let pkgs = packages::collect_packages(&host.runner, PACKAGE_MANAGERS).await;

    let thermal = thermal::collect_thermal(host, &sys);

    let runs_systemd = host.runs_systemd();
    let systemd = if runs_systemd {
        Some(systemd::collect_systemd(&host.runner).await)
    } else {
        None
    };

    cpu.percent = match sampler.await {
        Ok(percent) => Some(percent),
        Err(err) => {
            warn!(error = %err, "cpu load sampler did not finish");
            None
        }
    };

    progress("Diagnosing problems...");
    let problems = rules::evaluate(
        &Facts {
            os: host.os,
            release: release.as_ref(),
            runs_systemd,
            thermal: &thermal,
            systemd: systemd.as_ref(),
            cpu_percent: cpu.percent,
        },
        &cfg.rules,
    );

    Report {
        system: SystemInfo {
            name: identity.name,
            release: identity.release,
            platform: identity.platform,
            distro: identity.distro,
            libc: identity.libc,
            cpu,
            memory: system::collect_memory(&sys),
            swap: system::collect_swap(&sys),
            disks: system::collect_disks(&sys),
            pci,
            usb,
            block_devices,
            pkgs,
            boot_time: system::format_boot_time(sys.boot_time()),
            uptime: system::format_uptime(sys.uptime()),
        },
        sensors: Sensors { thermal },
        problems,
        systemd,
        hostname: sys.host_name(),
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::collectors::OsFamily;
    use crate::command::CommandRunner;
    use crate::testutil::{stub_bin, write_file};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    fn stub_tools(bin: &Path) {
        stub_bin(bin, "getconf", r"printf 'glibc 2.39\n'");
        stub_bin(
            bin,
            "lspci",
            r#"printf '%s\n' '00:02.0 "VGA compatible controller [0300]" "Intel Corporation [8086]" "UHD Graphics 620 [5917]" -r07 "Lenovo [17aa]" "ThinkPad [2258]"'"#,
        );
        stub_bin(
            bin,
            "lsusb",
            r"printf 'Bus 001 Device 002: ID 8087:0a2b Intel Corp. Bluetooth\n'",
        );
        stub_bin(bin, "lsblk", r#"printf '{"blockdevices":[{"name":"nvme0n1"}]}'"#);
        stub_bin(bin, "pacman", r"printf 'bash\nlinux\n'");
        stub_bin(
            bin,
            "systemctl",
            r#"case "$2" in
  --state=running) printf 'sshd.service loaded active running OpenSSH Daemon\n' ;;
  --state=failed) printf 'backup.service loaded failed failed Nightly backup\n' ;;
esac"#,
        );
        stub_bin(
            bin,
            "systemd-analyze",
            r#"printf '[{"unit":"cups.service","exposure":"9.6","predicate":"UNSAFE","happy":"x"}]'"#,
        );
    }

    fn fake_host(root: &Path, with_systemd: bool) -> Host {
        let bin = root.join("bin");
        std::fs::create_dir_all(&bin).expect("bin dir");
        stub_tools(&bin);

        write_file(&root.join("etc/os-release"), "NAME=\"Manjaro Linux\"\nPRETTY_NAME=\"Manjaro Linux\"\n");
        write_file(&root.join("proc/cpuinfo"), "model name\t: Test CPU @ 3.00GHz\n");
        write_file(&root.join("hwmon/hwmon0/name"), "coretemp\n");
        write_file(&root.join("hwmon/hwmon0/temp1_input"), "97000\n");
        write_file(&root.join("hwmon/hwmon0/temp1_crit"), "100000\n");
        let systemd_dir = root.join("run/systemd/system");
        if with_systemd {
            std::fs::create_dir_all(&systemd_dir).expect("systemd dir");
        }

        Host {
            os: OsFamily::Linux,
            paths: crate::collectors::HostPaths {
                os_release: vec![root.join("etc/os-release")],
                cpuinfo: root.join("proc/cpuinfo"),
                cpufreq: root.join("cpufreq"),
                hwmon: root.join("hwmon"),
                systemd_runtime: systemd_dir,
            },
            runner: CommandRunner::new(Duration::from_secs(5)).with_search_path(&bin),
        }
    }

    fn fast_config() -> Config {
        Config {
            cpu_sample_interval: Duration::from_millis(100),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn full_collection_with_stubbed_tools() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = fake_host(dir.path(), true);
        let stages = Mutex::new(Vec::new());

        let report = collect_report(&host, &fast_config(), |line| {
            stages.lock().expect("lock").push(line.to_string())
        })
        .await;

        assert_eq!(stages.into_inner().expect("lock"), vec!["Diagnosing problems..."]);
        assert_eq!(report.system.name, "Linux");
        assert_eq!(report.system.distro.as_deref(), Some("Manjaro Linux"));
        assert_eq!(report.system.libc.as_deref(), Some("glibc 2.39"));
        assert!(report.system.platform.ends_with("-with-glibc2.39"));
        assert_eq!(report.system.cpu.name, "Test CPU @ 3.00GHz");
        assert!(report.system.cpu.percent.is_some());
        assert_eq!(report.system.pkgs, vec![("pacman".to_string(), 2)]);
        assert_eq!(report.system.pci.as_ref().map(Vec::len), Some(1));
        assert_eq!(report.system.usb.as_ref().map(Vec::len), Some(1));
        assert!(report.system.block_devices.is_some());
        assert_eq!(report.sensors.thermal[0].entries[0].critical_percent, Some(0.97));

        let systemd = report.systemd.as_ref().expect("systemd present");
        assert_eq!(systemd.running.len(), 1);
        assert_eq!(systemd.failed.len(), 1);

        let ids: Vec<&str> = report.problems.iter().map(|p| p.id).collect();
        assert_eq!(
            &ids[..4],
            &[
                "warning-shitty-linux-distro",
                "alert-overheat",
                "warning-systemd-unit-failed",
                "notice-systemd-unit-unsafe",
            ]
        );

        let json: serde_json::Value =
            serde_json::from_str(&report.to_pretty_json().expect("json")).expect("parse");
        for key in ["system", "sensors", "problems", "systemd"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json.get("hostname").is_some(), report.hostname.is_some());
        for problem in json["problems"].as_array().expect("problems array") {
            let class = problem["class"].as_str().expect("class");
            assert!(["notice", "warning", "alert", "alarm"].contains(&class));
        }
    }

    #[tokio::test]
    async fn without_systemd_runtime_reports_legacy_init() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = fake_host(dir.path(), false);

        let report = collect_report(&host, &fast_config(), |_| {}).await;

        assert!(report.systemd.is_none());
        let json = serde_json::to_value(&report).expect("value");
        assert!(json.get("systemd").is_none());
        assert!(report
            .problems
            .iter()
            .any(|p| p.id == "warning-legacy-init-system"));
        assert!(!report
            .problems
            .iter()
            .any(|p| p.id == "warning-systemd-unit-failed"));
    }

    #[tokio::test]
    async fn absent_tools_and_release_are_omitted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut host = fake_host(dir.path(), false);
        let empty = dir.path().join("empty-bin");
        std::fs::create_dir_all(&empty).expect("empty bin");
        host.runner = CommandRunner::new(Duration::from_secs(5)).with_search_path(&empty);
        host.paths.os_release = vec![dir.path().join("nope")];

        let report = collect_report(&host, &fast_config(), |_| {}).await;
        let json = serde_json::to_value(&report).expect("value");
        let system = json["system"].as_object().expect("system");
        for key in ["distro", "libc", "pci", "usb", "block_devices"] {
            assert!(!system.contains_key(key), "{key} should be omitted");
        }
        assert_eq!(json["system"]["pkgs"], serde_json::json!([]));
        assert!(!report
            .problems
            .iter()
            .any(|p| p.id == "warning-shitty-linux-distro"));
    }
}
