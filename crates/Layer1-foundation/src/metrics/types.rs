//! Metrics sample model

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuMetrics {
    /// Overall usage percentage
    pub percent: f64,
    pub per_core: Vec<f64>,
    pub frequency_mhz: Option<f64>,
    pub temperature_c: Option<f64>,
    pub core_count: u32,
    pub thread_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub available_gb: f64,
    pub percent: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
    pub swap_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuMetrics {
    pub name: String,
    pub load_percent: f64,
    pub memory_total_mb: f64,
    pub memory_used_mb: f64,
    pub memory_percent: f64,
    pub temperature_c: Option<f64>,
    pub available: bool,
}

impl Default for GpuMetrics {
    fn default() -> Self {
        Self {
            name: "N/A".to_string(),
            load_percent: 0.0,
            memory_total_mb: 0.0,
            memory_used_mb: 0.0,
            memory_percent: 0.0,
            temperature_c: None,
            available: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
    pub read_bytes_sec: f64,
    pub write_bytes_sec: f64,
}

/// One host sample, opaque to the engine apart from `timestamp`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cpu: CpuMetrics,
    #[serde(default)]
    pub memory: MemoryMetrics,
    #[serde(default)]
    pub gpu: GpuMetrics,
    #[serde(default)]
    pub disk: DiskMetrics,
    #[serde(default)]
    pub uptime_seconds: f64,
}

impl SystemMetrics {
    /// Empty sample stamped now.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            cpu: CpuMetrics::default(),
            memory: MemoryMetrics::default(),
            gpu: GpuMetrics::default(),
            disk: DiskMetrics::default(),
            uptime_seconds: 0.0,
        }
    }
}

/// A sample as stored in the ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub seq: u64,
    pub metrics: SystemMetrics,
}

/// Column view of recent samples, shaped for chart libraries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsHistory {
    /// Local wall-clock `HH:MM:SS`
    pub timestamps: Vec<String>,
    pub cpu: Vec<f64>,
    pub memory: Vec<f64>,
    pub gpu: Vec<f64>,
    pub disk_read: Vec<f64>,
    pub disk_write: Vec<f64>,
}

impl MetricsHistory {
    pub fn push(&mut self, m: &SystemMetrics) {
        self.timestamps.push(
            m.timestamp
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
        );
        self.cpu.push(m.cpu.percent);
        self.memory.push(m.memory.percent);
        self.gpu.push(m.gpu.load_percent);
        self.disk_read.push(m.disk.read_bytes_sec);
        self.disk_write.push(m.disk.write_bytes_sec);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
