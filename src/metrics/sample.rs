use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Pid, System};

use crate::error::{MonitorError, MonitorResult};

/// One reading of the host process's resource usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OsSample {
    /// Percent of one core.
    pub cpu: f64,
    /// Resident memory in MB.
    pub memory: f64,
    /// 1, 5 and 15 minute load averages.
    pub load: [f64; 3],
    pub pid: u32,
    pub ppid: Option<u32>,
    /// Process run time.
    pub elapsed_ms: u64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Where the sampler gets its readings. Failures skip the tick.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn sample(&self) -> MonitorResult<OsSample>;
}

// ─── sysinfo-backed source ───────────────────────────────────────

/// Reads the current process through `sysinfo`.
///
/// The `System` is kept between calls because per-process CPU usage is
/// computed from the delta between two refreshes; the first reading is 0.
pub struct SysinfoSource {
    pid: Pid,
    system: Arc<Mutex<System>>,
}

impl SysinfoSource {
    pub fn current_process() -> MonitorResult<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| MonitorError::Sample(format!("cannot resolve own pid: {e}")))?;
        Ok(Self {
            pid,
            system: Arc::new(Mutex::new(System::new())),
        })
    }

    fn read(system: &Mutex<System>, pid: Pid) -> MonitorResult<OsSample> {
        let mut system = system.lock();
        if !system.refresh_process(pid) {
            return Err(MonitorError::Sample(format!("process {pid} not found")));
        }
        let process = system
            .process(pid)
            .ok_or_else(|| MonitorError::Sample(format!("process {pid} vanished")))?;

        let load = System::load_average();
        Ok(OsSample {
            cpu: process.cpu_usage() as f64,
            memory: process.memory() as f64 / 1024.0 / 1024.0,
            load: [load.one, load.five, load.fifteen],
            pid: pid.as_u32(),
            ppid: process.parent().map(|p| p.as_u32()),
            elapsed_ms: process.run_time().saturating_mul(1000),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}

#[async_trait]
impl SampleSource for SysinfoSource {
    async fn sample(&self) -> MonitorResult<OsSample> {
        let system = self.system.clone();
        let pid = self.pid;
        tokio::task::spawn_blocking(move || Self::read(&system, pid))
            .await
            .map_err(|e| MonitorError::Sample(format!("sampler task failed: {e}")))?
    }
}
