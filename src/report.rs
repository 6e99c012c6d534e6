use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub system: SystemInfo,
    pub sensors: Sensors,
    pub problems: Vec<Problem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systemd: Option<SystemdInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub name: String,
    pub release: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libc: Option<String>,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub swap: SwapInfo,
    pub disks: Vec<DiskUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pci: Option<Vec<PciDevice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb: Option<Vec<UsbDevice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_devices: Option<serde_json::Value>,
    /// `(manager, installed package count)` pairs, serialized as two-element arrays.
    pub pkgs: Vec<(String, usize)>,
    pub boot_time: String,
    pub uptime: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub name: String,
    pub arch: String,
    pub threads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_freq_mhz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_freq_mhz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_freq_mhz: Option<f64>,
    /// Filled in from the background sampler once it has been joined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskUsage {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PciDevice {
    pub slot: String,
    pub class: String,
    pub vendor: String,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsystem_vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsystem_device: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsbDevice {
    pub bus: String,
    pub device: String,
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Sensors {
    pub thermal: Vec<ThermalSensorGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThermalSensorGroup {
    pub name: String,
    pub entries: Vec<ThermalReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermalReading {
    pub name: String,
    pub current: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemClass {
    Notice,
    Warning,
    Alert,
    Alarm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub class: ProblemClass,
    pub id: &'static str,
    pub header: String,
    pub desc: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemdInfo {
    pub running: Vec<ServiceUnit>,
    pub exited: Vec<ServiceUnit>,
    pub failed: Vec<ServiceUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityExposure>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceUnit {
    pub unit: String,
    pub load: String,
    pub active: String,
    pub sub: String,
    pub description: String,
}

/// One entry of `systemd-analyze security --json=short`. Fields other than the
/// three the rules look at are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityExposure {
    pub unit: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub predicate: String,
    /// Kept as printed. systemd writes it as a string (`"9.6"`), sometimes `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

impl SecurityExposure {
    /// Numeric exposure level, accepting both the string and the number form.
    pub fn exposure_level(&self) -> Option<f64> {
        let level = match self.exposure.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        level.filter(|level| level.is_finite())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Report {
    /// Pretty JSON with four-space indentation.
    pub fn to_pretty_json(&self) -> Result<String, ReportError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let json = self.to_pretty_json()?;
        fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}
