use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

/// One monitored volume's last-known state. `device` is the registry key
/// and never changes after `get_or_create` first inserts the entry.
#[derive(Debug, Clone)]
pub struct VolumeEntry {
    pub device: String,
    pub mountpoint: String,
    pub vg: Option<String>,
    pub lv: Option<String>,
    pub fs_type: Option<String>,
    pub use_pct: u8,
    history: Vec<u8>,
    history_pos: usize,
    history_filled: usize,
    pub last_action: SystemTime,
    pub first_seen: SystemTime,
    pub last_msg: String,
    pub extension_count: u64,
    pub shrink_count: u64,
}

impl VolumeEntry {
    fn new(device: String, mountpoint: String, history_len: usize) -> Self {
        let now = SystemTime::now();
        VolumeEntry {
            device,
            mountpoint,
            vg: None,
            lv: None,
            fs_type: None,
            use_pct: 0,
            history: vec![0; history_len],
            history_pos: 0,
            history_filled: 0,
            last_action: now,
            first_seen: now,
            last_msg: String::new(),
            extension_count: 0,
            shrink_count: 0,
        }
    }

    /// A read-only view of the ring buffer in insertion order (oldest
    /// first among filled slots). Used by the classifier, which only
    /// cares whether every filled slot is below a threshold.
    pub fn history(&self) -> &[u8] {
        &self.history[..self.history_filled]
    }

    pub fn history_filled(&self) -> usize {
        self.history_filled
    }

    pub fn history_pos(&self) -> usize {
        self.history_pos
    }

    fn record(&mut self, use_pct: u8, msg: &str, max_buffer: usize) {
        self.use_pct = use_pct;
        let n = self.history.len();
        self.history[self.history_pos] = use_pct;
        self.history_pos = (self.history_pos + 1) % n;
        if self.history_filled < n {
            self.history_filled += 1;
        }
        self.last_msg = truncate(msg, max_buffer);
        self.last_action = SystemTime::now();
    }
}

fn truncate(msg: &str, max: usize) -> String {
    if msg.len() <= max {
        msg.to_string()
    } else {
        let mut s = msg.chars().take(max.saturating_sub(1)).collect::<String>();
        s.push('\u{2026}');
        s
    }
}

/// In-memory table of monitored volumes, capped at `max_volumes` entries.
/// All mutation and snapshotting happens under one mutex, matching the
/// "single critical section" guarantee the ring-buffer writes depend on.
pub struct Registry {
    entries: Mutex<HashMap<String, VolumeEntry>>,
    history_len: usize,
    max_volumes: usize,
    max_buffer: usize,
}

impl Registry {
    pub fn new(history_len: usize, max_volumes: usize, max_buffer: usize) -> Self {
        Registry {
            entries: Mutex::new(HashMap::new()),
            history_len,
            max_volumes,
            max_buffer,
        }
    }

    /// Creates a zero-initialised entry if `device` is unseen and the
    /// registry has room; otherwise updates `mountpoint` on the existing
    /// entry (when non-empty). Returns `false` if `device` is new and the
    /// registry is already at capacity — the caller must drop the sample.
    pub fn get_or_create(&self, device: &str, mountpoint: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(device) {
            if !mountpoint.is_empty() {
                entry.mountpoint = mountpoint.to_string();
            }
            return true;
        }
        if entries.len() >= self.max_volumes {
            return false;
        }
        entries.insert(
            device.to_string(),
            VolumeEntry::new(device.to_string(), mountpoint.to_string(), self.history_len),
        );
        true
    }

    /// Records one usage sample for `device`. No-op if `device` was never
    /// registered (callers are expected to call `get_or_create` first).
    pub fn record_sample(&self, device: &str, mountpoint: &str, use_pct: u8, msg: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(device) {
            if !mountpoint.is_empty() {
                entry.mountpoint = mountpoint.to_string();
            }
            entry.record(use_pct, msg, self.max_buffer);
        }
    }

    /// Updates the resolved VG/LV/filesystem-type fields as the planner
    /// learns them, without disturbing usage history.
    pub fn set_resolution(&self, device: &str, vg: &str, lv: &str, fs_type: Option<&str>) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(device) {
            entry.vg = Some(vg.to_string());
            entry.lv = Some(lv.to_string());
            if let Some(fs) = fs_type {
                entry.fs_type = Some(fs.to_string());
            }
        }
    }

    pub fn set_last_msg(&self, device: &str, msg: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(device) {
            entry.last_msg = truncate(msg, self.max_buffer);
            entry.last_action = SystemTime::now();
        }
    }

    pub fn record_extension(&self, device: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(device) {
            entry.extension_count += 1;
        }
    }

    pub fn record_shrink(&self, device: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(device) {
            entry.shrink_count += 1;
        }
    }

    pub fn get(&self, device: &str) -> Option<VolumeEntry> {
        self.entries.lock().unwrap().get(device).cloned()
    }

    /// Deep-copied snapshot for external readers (the status endpoint),
    /// decoupled from the live lock.
    pub fn snapshot(&self) -> Vec<VolumeEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
