//! Collaborator interfaces supplying telemetry and the device credential

use devlink_shared::DeviceCredential;
use std::path::{Path, PathBuf};

/// Lightweight telemetry attached to every heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Telemetry {
    pub battery_level: u8,
    pub link_speed_kbps: u32,
}

/// Pure query for current battery and link speed
pub trait TelemetrySource: Send + Sync {
    fn telemetry(&self) -> Telemetry;
}

/// Supplies the device credential, if one has been provisioned
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<DeviceCredential>;
}

/// Fixed telemetry values
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTelemetry(pub Telemetry);

impl TelemetrySource for StaticTelemetry {
    fn telemetry(&self) -> Telemetry {
        self.0
    }
}

/// Reads battery and link speed from Linux sysfs. Missing values read as 0.
#[derive(Debug, Clone)]
pub struct SysfsTelemetry {
    power_supply_dir: PathBuf,
    net_dir: PathBuf,
}

impl Default for SysfsTelemetry {
    fn default() -> Self {
        Self::new("/sys/class/power_supply", "/sys/class/net")
    }
}

impl SysfsTelemetry {
    pub fn new(power_supply_dir: impl Into<PathBuf>, net_dir: impl Into<PathBuf>) -> Self {
        Self {
            power_supply_dir: power_supply_dir.into(),
            net_dir: net_dir.into(),
        }
    }

    fn battery_level(&self) -> u8 {
        read_entries(&self.power_supply_dir, "capacity")
            .into_iter()
            .next()
            .map(|pct| pct.clamp(0, 100) as u8)
            .unwrap_or(0)
    }

    /// Fastest link in kbps; sysfs reports Mbps and -1 for down links
    fn link_speed_kbps(&self) -> u32 {
        read_entries(&self.net_dir, "speed")
            .into_iter()
            .filter(|mbps| *mbps > 0)
            .max()
            .map(|mbps| (mbps as u64 * 1000).min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }
}

impl TelemetrySource for SysfsTelemetry {
    fn telemetry(&self) -> Telemetry {
        Telemetry {
            battery_level: self.battery_level(),
            link_speed_kbps: self.link_speed_kbps(),
        }
    }
}

/// Read `<dir>/*/<file>` as integers, sorted by entry name
fn read_entries(dir: &Path, file: &str) -> Vec<i64> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path().join(file))
        .collect();
    paths.sort();

    paths
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .filter_map(|s| s.trim().parse::<i64>().ok())
        .collect()
}

/// Credential from an environment variable
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new("DEVLINK_DEVICE_TOKEN")
    }
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn credential(&self) -> Option<DeviceCredential> {
        std::env::var(&self.var)
            .ok()
            .map(DeviceCredential::new)
            .filter(|c| !c.is_empty())
    }
}
