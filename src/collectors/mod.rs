pub mod cpu_load;
pub mod devices;
pub mod os_release;
pub mod packages;
pub mod system;
pub mod systemd;
pub mod thermal;

use crate::command::CommandRunner;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    Darwin,
    Windows,
    Other(&'static str),
}

impl OsFamily {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::Darwin,
            "windows" => Self::Windows,
            other => Self::Other(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Darwin => "Darwin",
            Self::Windows => "Windows",
            Self::Other(name) => name,
        }
    }
}

/// Filesystem locations the collectors read from.
#[derive(Debug, Clone)]
pub struct HostPaths {
    pub os_release: Vec<PathBuf>,
    pub cpuinfo: PathBuf,
    pub cpufreq: PathBuf,
    pub hwmon: PathBuf,
    pub systemd_runtime: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            os_release: vec![
                PathBuf::from("/etc/os-release"),
                PathBuf::from("/usr/lib/os-release"),
            ],
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            cpufreq: PathBuf::from("/sys/devices/system/cpu/cpu0/cpufreq"),
            hwmon: PathBuf::from("/sys/class/hwmon"),
            systemd_runtime: PathBuf::from("/run/systemd/system"),
        }
    }
}

/// Everything a collector needs to know about where and how to query the host.
#[derive(Debug, Clone)]
pub struct Host {
    pub os: OsFamily,
    pub paths: HostPaths,
    pub runner: CommandRunner,
}

impl Host {
    pub fn current(command_timeout: Duration) -> Self {
        Self {
            os: OsFamily::current(),
            paths: HostPaths::default(),
            runner: CommandRunner::new(command_timeout),
        }
    }

    /// Linux booted with systemd as PID 1.
    pub fn runs_systemd(&self) -> bool {
        self.os == OsFamily::Linux && self.paths.systemd_runtime.is_dir()
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
