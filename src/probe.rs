use crate::error::{ExtendError, Result};
use crate::executor::{Executor, Kind};

/// One line of `df -P` output concerning a device under `/dev/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSample {
    pub device: String,
    pub mountpoint: String,
    pub use_pct: u8,
}

/// Pure query layer over the Executor: every operation here is read-only
/// and composes a fixed command string, then parses the result. None of
/// these functions touch the Registry or the Queue.
pub struct StorageProbe<'a> {
    executor: &'a Executor,
}

impl<'a> StorageProbe<'a> {
    pub fn new(executor: &'a Executor) -> Self {
        StorageProbe { executor }
    }

    /// Enumerates every mounted `/dev/*` filesystem and its usage
    /// percent. Lines with the wrong column count are silently dropped;
    /// a blank usage column is treated as 0%.
    pub async fn scan_mounts(&self) -> Vec<MountSample> {
        let lines = self.executor.run_lines("df -P 2>/dev/null", "scan mounts").await;
        lines
            .into_iter()
            .skip(1) // header
            .filter_map(|line| parse_df_line(&line))
            .collect()
    }

    /// Resolves a device path to (vg, lv): first via `lvs`, then by
    /// structurally parsing the path itself.
    pub async fn resolve_device(&self, device: &str) -> Result<(String, String)> {
        let cmd = format!(
            "lvs --noheadings -o vg_name,lv_name {device} 2>/dev/null | tr -s ' '"
        );
        let out = self.executor.run(Kind::Read, &cmd, "resolve device").await;
        let mut fields = out.first_line.trim().split_whitespace();
        if let (Some(vg), Some(lv)) = (fields.next(), fields.next()) {
            return Ok((vg.to_string(), lv.to_string()));
        }

        parse_device_path(device).ok_or(ExtendError::Resolution)
    }

    /// Non-negative on success; a negative sentinel if the probe failed
    /// or returned unparseable output.
    pub async fn vg_free_bytes(&self, vg: &str) -> i64 {
        let cmd = format!(
            "vgs --noheadings --units b --nosuffix -o vg_free {vg} 2>/dev/null | tr -d ' '"
        );
        let out = self.executor.run(Kind::Read, &cmd, "vg free bytes").await;
        out.first_line.parse::<i64>().unwrap_or(-1)
    }

    /// Empty string on failure.
    pub async fn fs_type(&self, vg: &str, lv: &str) -> String {
        let cmd = format!("lsblk -no FSTYPE /dev/{vg}/{lv} 2>/dev/null");
        let out = self.executor.run(Kind::Read, &cmd, "fs type").await;
        out.first_line
    }

    /// Bytes available inside the mounted filesystem of `(vg, lv)`.
    pub async fn fs_free_bytes(&self, vg: &str, lv: &str) -> i64 {
        let cmd = format!(
            "df -P --block-size=1 /dev/{vg}/{lv} 2>/dev/null | tail -1 | awk '{{print $4}}'"
        );
        let out = self.executor.run(Kind::Read, &cmd, "fs free bytes").await;
        out.first_line.parse::<i64>().unwrap_or(-1)
    }

    pub async fn is_physical_volume(&self, device: &str) -> bool {
        let cmd = format!("pvs --noheadings -o pv_name 2>/dev/null | grep -w '{device}'");
        let out = self.executor.run(Kind::Read, &cmd, "is physical volume").await;
        out.success()
    }

    /// Lists every LV name in `vg`, for the donor-shrink scan.
    pub async fn list_lvs(&self, vg: &str) -> Vec<String> {
        let cmd = format!("lvs --noheadings -o lv_name {vg} 2>/dev/null | tr -d ' '");
        self.executor
            .run_lines(&cmd, "list lvs")
            .await
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }
}

fn parse_df_line(line: &str) -> Option<MountSample> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    let device = fields[0];
    if !device.starts_with("/dev/") {
        return None;
    }
    let usep = fields[4].trim_end_matches('%');
    let use_pct = if usep.is_empty() {
        0
    } else {
        usep.parse::<u8>().ok()?
    };
    Some(MountSample {
        device: device.to_string(),
        mountpoint: fields[5].to_string(),
        use_pct,
    })
}

/// Structural fallback for `resolve_device`: accepts `…/mapper/vg-lv` and
/// `…/vg/lv` shapes.
fn parse_device_path(device: &str) -> Option<(String, String)> {
    if let Some(idx) = device.find("/mapper/") {
        let name = &device[idx + "/mapper/".len()..];
        let (vg, lv) = name.split_once('-')?;
        if vg.is_empty() || lv.is_empty() {
            return None;
        }
        return Some((vg.to_string(), lv.to_string()));
    }

    let stripped = device.strip_prefix("/dev/")?;
    let (vg, lv) = stripped.split_once('/')?;
    if vg.is_empty() || lv.is_empty() || lv.contains('/') {
        return None;
    }
    Some((vg.to_string(), lv.to_string()))
}

/// A sibling LV's filesystem type may only be shrunk if it is one of
/// these. XFS and anything unrecognized is never shrunk.
pub fn can_shrink_filesystem(fs_type: &str, shrinkable: &[String]) -> bool {
    shrinkable.iter().any(|s| s == fs_type)
}
