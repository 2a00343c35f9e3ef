use crate::registry::VolumeEntry;

/// Three-way volume state. Represented as an enum, not boolean flags, so
/// that `classify` stays a total pure function with no hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ok,
    Hungry,
    OverProvisioned,
}

/// Turns a registry entry's current usage and history into a
/// classification. HUNGRY is checked first and always wins over
/// OVER-PROVISIONED, so a volume that dipped low then spiked is rescued
/// even if its window still reads as all-low.
pub fn classify(entry: &VolumeEntry, threshold_high: u8, threshold_low: u8) -> Classification {
    if entry.use_pct >= threshold_high {
        return Classification::Hungry;
    }

    let history = entry.history();
    if entry_window_full(entry) && history.iter().all(|&s| s <= threshold_low) {
        return Classification::OverProvisioned;
    }

    Classification::Ok
}

fn entry_window_full(entry: &VolumeEntry) -> bool {
    // `history()` is already sliced to `history_filled`; a full window
    // means every configured slot has been written at least once.
    entry.history_filled() == entry.history().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn sample(reg: &Registry, device: &str, pcts: &[u8]) {
        reg.get_or_create(device, "/mnt/m");
        for &p in pcts {
            reg.record_sample(device, "/mnt/m", p, "monitored");
        }
    }

    #[test]
    fn hungry_triggers_on_high_threshold_inclusive() {
        let reg = Registry::new(4, 64, 8192);
        sample(&reg, "/dev/x/y", &[50, 60, 80]);
        let entry = reg.get("/dev/x/y").unwrap();
        assert_eq!(classify(&entry, 80, 40), Classification::Hungry);
    }

    #[test]
    fn over_provisioned_requires_full_window() {
        let reg = Registry::new(4, 64, 8192);
        sample(&reg, "/dev/x/y", &[10, 20, 30, 40]);
        let entry = reg.get("/dev/x/y").unwrap();
        assert_eq!(classify(&entry, 80, 40), Classification::OverProvisioned);
    }

    #[test]
    fn not_yet_warm_window_is_ok() {
        let reg = Registry::new(4, 64, 8192);
        sample(&reg, "/dev/x/y", &[10, 20, 30]);
        let entry = reg.get("/dev/x/y").unwrap();
        assert_eq!(classify(&entry, 80, 40), Classification::Ok);
    }

    #[test]
    fn single_spike_disqualifies_over_provisioned() {
        let reg = Registry::new(4, 64, 8192);
        sample(&reg, "/dev/x/y", &[10, 20, 41, 10]);
        let entry = reg.get("/dev/x/y").unwrap();
        assert_eq!(classify(&entry, 80, 40), Classification::Ok);
    }

    #[test]
    fn hungry_takes_precedence_over_over_provisioned() {
        let reg = Registry::new(4, 64, 8192);
        sample(&reg, "/dev/x/y", &[10, 20, 30, 85]);
        let entry = reg.get("/dev/x/y").unwrap();
        assert_eq!(classify(&entry, 80, 40), Classification::Hungry);
    }

    #[test]
    fn classifier_is_idempotent() {
        let reg = Registry::new(4, 64, 8192);
        sample(&reg, "/dev/x/y", &[10, 20, 30, 40]);
        let entry = reg.get("/dev/x/y").unwrap();
        let a = classify(&entry, 80, 40);
        let b = classify(&entry, 80, 40);
        assert_eq!(a, b);
    }
}
