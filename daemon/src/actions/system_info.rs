//! System telemetry report

use std::thread;

use sysinfo::System;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Snapshot of the fields read back by "system info"
#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub system: String,
    pub version: String,
    pub machine: String,
    pub processor: String,
    pub total_memory_bytes: u64,
    pub cpu_usage_percent: f32,
    pub memory_usage_percent: f32,
}

impl SystemInfo {
    /// Gather a snapshot; CPU usage needs two refreshes a sampling interval apart
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();
        thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();

        let total = sys.total_memory();
        let used = sys.used_memory();
        let memory_usage_percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64 * 100.0) as f32
        };

        Self {
            system: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            version: System::os_version().unwrap_or_default(),
            machine: std::env::consts::ARCH.to_string(),
            processor: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().trim().to_string())
                .unwrap_or_default(),
            total_memory_bytes: total,
            cpu_usage_percent: sys.global_cpu_info().cpu_usage(),
            memory_usage_percent,
        }
    }

    /// Seven `Key: Value` lines in fixed order
    pub fn report(&self) -> String {
        let ram_gib = (self.total_memory_bytes as f64 / GIB * 100.0).round() / 100.0;
        [
            format!("System: {}", self.system),
            format!("Version: {}", self.version),
            format!("Machine: {}", self.machine),
            format!("Processor: {}", self.processor),
            format!("RAM: {ram_gib} GB"),
            format!("CPU Usage: {:.1}%", self.cpu_usage_percent),
            format!("Memory Usage: {:.1}%", self.memory_usage_percent),
        ]
        .join("\n")
    }
}
