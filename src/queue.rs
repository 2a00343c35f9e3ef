use std::sync::Mutex;

use tokio::sync::Notify;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Single-slot coalescing mailbox coupling the supervisor to the
/// planner. At most one device is pending at a time; a second `enqueue`
/// while the slot is full is dropped, not queued, because the planner
/// will re-discover the same or worse state on its own next pass.
pub struct RequestQueue {
    slot: Mutex<Option<String>>,
    notify: Notify,
}

/// `dequeue`'s wait is bounded so the caller can observe cancellation
/// promptly even with no pending work.
pub enum Dequeued {
    Device(String),
    TimedOut,
}

impl RequestQueue {
    pub fn new() -> Self {
        RequestQueue {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Stores `device` if the slot is empty and wakes one waiter.
    /// Otherwise drops the request and logs a coalescing warning.
    pub fn enqueue(&self, device: &str) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_some() {
            warn!(%device, "queue slot occupied, coalescing request");
            return;
        }
        *slot = Some(device.to_string());
        drop(slot);
        self.notify.notify_one();
    }

    /// Waits up to `poll_interval` for a pending device, then atomically
    /// takes and clears the slot. Returns `TimedOut` if nothing arrived,
    /// so the caller can re-check a cancellation signal.
    pub async fn dequeue(&self, poll_interval: Duration) -> Dequeued {
        if let Some(device) = self.take() {
            return Dequeued::Device(device);
        }

        let notified = self.notify.notified();
        match timeout(poll_interval, notified).await {
            Ok(()) => match self.take() {
                Some(device) => Dequeued::Device(device),
                None => Dequeued::TimedOut,
            },
            Err(_) => Dequeued::TimedOut,
        }
    }

    fn take(&self) -> Option<String> {
        self.slot.lock().unwrap().take()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slot.lock().unwrap().is_none()
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
