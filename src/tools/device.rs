//! `check_device_status`: battery level and network reachability

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::Tool;
use crate::llm::FunctionDeclaration;
use crate::Result;

/// Default sysfs power-supply directory
const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Connectivity probe timeout
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Battery snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    /// Charge percentage (0-100)
    pub level: u8,
    pub charging: bool,
}

/// Source of device facts
#[async_trait]
pub trait DeviceProbe: Send + Sync {
    /// Current battery state, `None` on machines without a battery
    async fn battery(&self) -> Option<BatteryStatus>;

    /// Whether the network is reachable
    async fn online(&self) -> bool;
}

/// Reads sysfs for battery state and opens a TCP connection for reachability
#[derive(Debug, Clone)]
pub struct SystemProbe {
    power_supply_dir: PathBuf,
    probe_addr: String,
}

impl SystemProbe {
    /// Probe the live system, testing reachability against `probe_addr`
    #[must_use]
    pub fn new(probe_addr: impl Into<String>) -> Self {
        Self {
            power_supply_dir: PathBuf::from(POWER_SUPPLY_DIR),
            probe_addr: probe_addr.into(),
        }
    }

    /// Read power-supply entries from a different directory
    #[must_use]
    pub fn with_power_supply_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.power_supply_dir = dir.into();
        self
    }

    fn read_battery(&self) -> Option<BatteryStatus> {
        let entries = std::fs::read_dir(&self.power_supply_dir).ok()?;

        for entry in entries.flatten() {
            let path = entry.path();
            let kind = read_trimmed(&path.join("type"));
            if kind.as_deref() != Some("Battery") {
                continue;
            }

            let Some(level) = read_trimmed(&path.join("capacity")).and_then(|c| c.parse::<u8>().ok())
            else {
                continue;
            };
            let status = read_trimmed(&path.join("status")).unwrap_or_default();

            return Some(BatteryStatus {
                level: level.min(100),
                charging: matches!(status.as_str(), "Charging" | "Full"),
            });
        }

        None
    }
}

fn read_trimmed(path: &std::path::Path) -> Option<String> {
    std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

#[async_trait]
impl DeviceProbe for SystemProbe {
    async fn battery(&self) -> Option<BatteryStatus> {
        self.read_battery()
    }

    async fn online(&self) -> bool {
        let connect = tokio::net::TcpStream::connect(&self.probe_addr);
        matches!(tokio::time::timeout(PROBE_TIMEOUT, connect).await, Ok(Ok(_)))
    }
}

/// Reports battery and connectivity
pub struct DeviceStatusTool {
    probe: Arc<dyn DeviceProbe>,
}

impl DeviceStatusTool {
    /// Create the tool over a probe
    #[must_use]
    pub fn new(probe: Arc<dyn DeviceProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl Tool for DeviceStatusTool {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "check_device_status".to_string(),
            description: "Checks the device's battery level and network connection status."
                .to_string(),
            parameters: None,
        }
    }

    async fn invoke(&self, _args: &Value) -> Result<Value> {
        let (battery, online) = tokio::join!(self.probe.battery(), self.probe.online());

        let battery = battery.map_or(Value::Null, |b| {
            serde_json::json!({
                "level": format!("{}%", b.level),
                "charging": b.charging,
            })
        });

        Ok(serde_json::json!({
            "battery": battery,
            "online": online,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_battery(root: &std::path::Path, name: &str, capacity: &str, status: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("type"), "Battery\n").unwrap();
        std::fs::write(dir.join("capacity"), capacity).unwrap();
        std::fs::write(dir.join("status"), status).unwrap();
    }

    #[test]
    fn reads_battery_from_power_supply_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ac = dir.path().join("AC");
        std::fs::create_dir_all(&ac).unwrap();
        std::fs::write(ac.join("type"), "Mains\n").unwrap();
        fake_battery(dir.path(), "BAT0", "87\n", "Charging\n");

        let probe = SystemProbe::new("127.0.0.1:9").with_power_supply_dir(dir.path());
        assert_eq!(
            probe.read_battery(),
            Some(BatteryStatus {
                level: 87,
                charging: true
            })
        );
    }

    #[test]
    fn no_battery_without_entries() {
        let dir = tempfile::tempdir().unwrap();
        let probe = SystemProbe::new("127.0.0.1:9").with_power_supply_dir(dir.path());
        assert_eq!(probe.read_battery(), None);
    }

    struct FixedProbe;

    #[async_trait]
    impl DeviceProbe for FixedProbe {
        async fn battery(&self) -> Option<BatteryStatus> {
            Some(BatteryStatus {
                level: 42,
                charging: false,
            })
        }

        async fn online(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn formats_status_payload() {
        let tool = DeviceStatusTool::new(Arc::new(FixedProbe));
        let output = tool.invoke(&Value::Null).await.unwrap();

        assert_eq!(output["battery"]["level"], "42%");
        assert_eq!(output["battery"]["charging"], false);
        assert_eq!(output["online"], true);
    }

    #[tokio::test]
    async fn online_probe_detects_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let probe = SystemProbe::new(addr);
        assert!(probe.online().await);
    }
}
