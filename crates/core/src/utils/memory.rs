use sysinfo::{Pid, System};

/// Samples this process's resident set size and tracks the highest value seen
/// since construction.
pub struct MemoryTracker {
    system: System,
    pid: Pid,
    baseline: u64,
    peak: u64,
}

impl MemoryTracker {
    pub fn start() -> Self {
        let mut tracker = Self {
            system: System::new(),
            pid: Pid::from(std::process::id() as usize),
            baseline: 0,
            peak: 0,
        };
        tracker.baseline = tracker.current_rss();
        tracker.peak = tracker.baseline;
        tracker
    }

    /// Current RSS in bytes, 0 when the platform does not report it.
    fn current_rss(&mut self) -> u64 {
        self.system.refresh_process(self.pid);
        self.system
            .process(self.pid)
            .map(|process| process.memory())
            .unwrap_or(0)
    }

    pub fn sample(&mut self) {
        let rss = self.current_rss();
        self.peak = self.peak.max(rss);
    }

    pub fn peak_delta_bytes(&self) -> u64 {
        self.peak.saturating_sub(self.baseline)
    }
}
