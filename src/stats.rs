use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

/// Process-wide monotonic counters, guarded separately from the
/// Registry so that stat increments never block registry readers.
pub struct Stats {
    checks_performed: AtomicU64,
    extensions_succeeded: AtomicU64,
    extensions_failed: AtomicU64,
    shrinks: AtomicU64,
    fallback_pvs_added: AtomicU64,
    start_time: SystemTime,
    last_check: Mutex<Option<SystemTime>>,
}

impl Stats {
    pub fn new() -> Self {
        Stats {
            checks_performed: AtomicU64::new(0),
            extensions_succeeded: AtomicU64::new(0),
            extensions_failed: AtomicU64::new(0),
            shrinks: AtomicU64::new(0),
            fallback_pvs_added: AtomicU64::new(0),
            start_time: SystemTime::now(),
            last_check: Mutex::new(None),
        }
    }

    pub fn record_check(&self) {
        self.checks_performed.fetch_add(1, Ordering::Relaxed);
        *self.last_check.lock().unwrap() = Some(SystemTime::now());
    }

    pub fn record_extension_success(&self) {
        self.extensions_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extension_failure(&self) {
        self.extensions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shrink(&self) {
        self.shrinks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_pv(&self) {
        self.fallback_pvs_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            checks_performed: self.checks_performed.load(Ordering::Relaxed),
            extensions_succeeded: self.extensions_succeeded.load(Ordering::Relaxed),
            extensions_failed: self.extensions_failed.load(Ordering::Relaxed),
            shrinks: self.shrinks.load(Ordering::Relaxed),
            fallback_pvs_added: self.fallback_pvs_added.load(Ordering::Relaxed),
            start_time: self.start_time,
            last_check: *self.last_check.lock().unwrap(),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub checks_performed: u64,
    pub extensions_succeeded: u64,
    pub extensions_failed: u64,
    pub shrinks: u64,
    pub fallback_pvs_added: u64,
    pub start_time: SystemTime,
    pub last_check: Option<SystemTime>,
}
