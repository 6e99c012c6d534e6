use super::os_release::OsRelease;
use super::{round_to, Host, OsFamily};
use crate::report::{CpuInfo, DiskUsage, MemoryInfo, SwapInfo};
use chrono::{Local, TimeZone};
use regex::Regex;
use std::fs;
use std::path::Path;
use sysinfo::{CpuExt, DiskExt, System, SystemExt};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OsIdentity {
    pub name: String,
    pub release: String,
    pub platform: String,
    pub distro: Option<String>,
    pub libc: Option<String>,
}

pub fn os_identity(
    os: OsFamily,
    system: &System,
    release: Option<&OsRelease>,
    libc: Option<String>,
) -> OsIdentity {
    let name = os.name().to_string();
    let kernel = system.kernel_version().unwrap_or_default();
    let platform = platform_string(&name, &kernel, std::env::consts::ARCH, libc.as_deref());

    OsIdentity {
        name,
        release: kernel,
        platform,
        distro: release.and_then(|r| r.name()).map(str::to_string),
        libc,
    }
}

fn platform_string(name: &str, release: &str, arch: &str, libc: Option<&str>) -> String {
    let mut platform = format!("{name}-{release}-{arch}");
    if let Some(libc) = libc {
        platform.push_str("-with-");
        platform.push_str(&libc.replace(' ', ""));
    }
    platform
}

/// `"glibc 2.35"` on glibc systems, `None` everywhere else.
pub async fn collect_libc(host: &Host) -> Option<String> {
    if host.os != OsFamily::Linux {
        return None;
    }
    match host.runner.run("getconf", &["GNU_LIBC_VERSION"]).await {
        Ok(out) if out.success => {
            let text = out.text();
            let version = text.trim();
            (!version.is_empty()).then(|| version.to_string())
        }
        Ok(_) => None,
        Err(err) => {
            debug!(error = %err, "libc version unavailable");
            None
        }
    }
}

pub async fn collect_cpu(host: &Host, system: &System) -> CpuInfo {
    let name = cpu_name(host, system).await;
    let current_freq_mhz = system
        .cpus()
        .first()
        .map(|c| c.frequency() as f64)
        .filter(|f| *f > 0.0);

    CpuInfo {
        name,
        arch: std::env::consts::ARCH.to_string(),
        threads: system.cpus().len(),
        cores: system.physical_core_count(),
        min_freq_mhz: read_khz_as_mhz(&host.paths.cpufreq.join("cpuinfo_min_freq")),
        max_freq_mhz: read_khz_as_mhz(&host.paths.cpufreq.join("cpuinfo_max_freq")),
        current_freq_mhz,
        percent: None,
    }
}

async fn cpu_name(host: &Host, system: &System) -> String {
    match host.os {
        OsFamily::Windows => std::env::var("PROCESSOR_IDENTIFIER")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| system.cpus().first().map(|c| c.brand().to_string()))
            .unwrap_or_default(),
        OsFamily::Darwin => match host
            .runner
            .run("sysctl", &["-n", "machdep.cpu.brand_string"])
            .await
        {
            Ok(out) => out.text().trim().to_string(),
            Err(err) => {
                debug!(error = %err, "cpu brand string unavailable");
                String::new()
            }
        },
        OsFamily::Linux => fs::read_to_string(&host.paths.cpuinfo)
            .ok()
            .and_then(|text| parse_model_name(&text))
            .unwrap_or_default(),
        OsFamily::Other(_) => String::new(),
    }
}

fn parse_model_name(cpuinfo: &str) -> Option<String> {
    let line = cpuinfo.lines().find(|l| l.starts_with("model name"))?;
    let prefix = Regex::new(r"^[^:]*:\s*").ok()?;
    Some(prefix.replace(line, "").trim().to_string())
}

fn read_khz_as_mhz(path: &Path) -> Option<f64> {
    let raw = fs::read_to_string(path).ok()?;
    let khz = raw.trim().parse::<f64>().ok()?;
    Some(khz / 1000.0)
}

pub fn collect_memory(system: &System) -> MemoryInfo {
    let total = system.total_memory();
    let used = system.used_memory();
    MemoryInfo {
        total,
        available: system.available_memory(),
        used,
        free: system.free_memory(),
        percent: percent_of(used, total),
    }
}

pub fn collect_swap(system: &System) -> SwapInfo {
    let total = system.total_swap();
    let used = system.used_swap();
    SwapInfo {
        total,
        used,
        free: system.free_swap(),
        percent: percent_of(used, total),
    }
}

pub fn collect_disks(system: &System) -> Vec<DiskUsage> {
    system
        .disks()
        .iter()
        .map(|d| {
            let total = d.total_space();
            let free = d.available_space();
            let used = total.saturating_sub(free);
            DiskUsage {
                device: d.name().to_string_lossy().to_string(),
                mountpoint: d.mount_point().to_string_lossy().to_string(),
                fstype: String::from_utf8_lossy(d.file_system()).to_string(),
                total,
                used,
                free,
                percent: percent_of(used, total),
            }
        })
        .collect()
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(part as f64 / total as f64 * 100.0, 1)
}

/// Local time, `%Y-%m-%d %H:%M:%S`.
pub fn format_boot_time(boot_unix: u64) -> String {
    Local
        .timestamp_opt(boot_unix as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
