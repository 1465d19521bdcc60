//! Host metrics sampler backed by `sysinfo`
//!
//! CPU and disk I/O figures are rates, so the first sample after start
//! reports zero for them. GPU is reported unavailable.

use async_trait::async_trait;
use ralph_foundation::{MetricsSampler, Result, SystemMetrics};
use std::path::Path;
use std::time::Instant;
use sysinfo::{Disk, Disks, ProcessRefreshKind, ProcessesToUpdate, System};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub struct HostSampler {
    system: System,
    disks: Disks,
    /// Time of the previous process refresh; I/O counters are deltas since then
    last_io: Option<Instant>,
}

impl HostSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
            last_io: None,
        }
    }

    /// Bytes read and written by every visible process since the last call.
    fn io_since_last(&mut self) -> (u64, u64) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new().with_disk_usage(),
        );
        self.system
            .processes()
            .values()
            .map(|p| p.disk_usage())
            .fold((0, 0), |(r, w), usage| {
                (r + usage.read_bytes, w + usage.written_bytes)
            })
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSampler for HostSampler {
    fn name(&self) -> &str {
        "sysinfo"
    }

    async fn sample(&mut self) -> Result<SystemMetrics> {
        let mut metrics = SystemMetrics::now();

        self.system.refresh_cpu_all();
        let cpus = self.system.cpus();
        metrics.cpu.percent = round1(self.system.global_cpu_usage() as f64);
        metrics.cpu.per_core = cpus.iter().map(|c| round1(c.cpu_usage() as f64)).collect();
        metrics.cpu.thread_count = cpus.len() as u32;
        metrics.cpu.core_count = self
            .system
            .physical_core_count()
            .unwrap_or(cpus.len()) as u32;
        metrics.cpu.frequency_mhz = cpus
            .first()
            .map(|c| c.frequency() as f64)
            .filter(|mhz| *mhz > 0.0);

        self.system.refresh_memory();
        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let used = total.saturating_sub(available);
        metrics.memory.total_gb = gb(total);
        metrics.memory.available_gb = gb(available);
        metrics.memory.used_gb = gb(used);
        metrics.memory.percent = percent(used, total);
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();
        metrics.memory.swap_total_gb = gb(swap_total);
        metrics.memory.swap_used_gb = gb(swap_used);
        metrics.memory.swap_percent = percent(swap_used, swap_total);

        self.disks.refresh();
        if let Some(disk) = root_disk(self.disks.list()) {
            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            metrics.disk.total_gb = gb(total);
            metrics.disk.free_gb = gb(free);
            metrics.disk.used_gb = gb(used);
            metrics.disk.percent = percent(used, total);
        }

        let (read, written) = self.io_since_last();
        let now = Instant::now();
        if let Some(at) = self.last_io {
            let elapsed = now.duration_since(at).as_secs_f64();
            if elapsed > 0.0 {
                metrics.disk.read_bytes_sec = round1(read as f64 / elapsed);
                metrics.disk.write_bytes_sec = round1(written as f64 / elapsed);
            }
        }
        self.last_io = Some(now);

        metrics.uptime_seconds = System::uptime() as f64;
        Ok(metrics)
    }
}

/// The disk mounted at `/`, else the largest one.
fn root_disk(disks: &[Disk]) -> Option<&Disk> {
    disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.iter().max_by_key(|d| d.total_space()))
}

fn gb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GB)
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(100.0 * part as f64 / whole as f64)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
