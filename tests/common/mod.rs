//! Shared fixture for end-to-end planner tests: stubs the `lvm2`/`util-linux`
//! tool surface with small shell scripts on `$PATH`, the same trick
//! `vinit::main::set_basic_env` uses to pin down a known `PATH` before
//! spawning anything.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;

// `PATH` is process-wide; serialize every fixture so concurrent tests in
// this binary don't stomp on each other's stub directory.
static PATH_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct Fixture {
    _guard: MutexGuard<'static, ()>,
    dir: tempfile::TempDir,
    old_path: String,
}

fn write_script(path: &PathBuf, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

impl Fixture {
    /// Builds a stub-tool directory and prepends it to `PATH`. `vg_free`
    /// is the initial content of the file the `vgs` stub cats back.
    pub fn new(vg_free_bytes: i64) -> Self {
        let guard = PATH_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().to_path_buf();

        let vg_free_file = bin.join("vg_free");
        fs::write(&vg_free_file, vg_free_bytes.to_string()).unwrap();

        let fstype_map = bin.join("fstype_map");
        fs::write(&fstype_map, "").unwrap();

        let donor_free_map = bin.join("donor_free_map");
        fs::write(&donor_free_map, "").unwrap();

        let list_lvs_file = bin.join("list_lvs");
        fs::write(&list_lvs_file, "").unwrap();

        let pv_list_file = bin.join("pv_list");
        fs::write(&pv_list_file, "").unwrap();

        let mutate_log = bin.join("mutate_log");
        fs::write(&mutate_log, "").unwrap();

        write_script(
            &bin.join("sudo"),
            r#"exec "$@""#,
        );

        write_script(
            &bin.join("lvs"),
            &format!(
                r#"
if [ "$3" = "vg_name,lv_name" ]; then
    device="$4"
    vg=$(echo "$device" | cut -d/ -f3)
    lv=$(echo "$device" | cut -d/ -f4)
    echo "  $vg $lv"
elif [ "$3" = "lv_name" ]; then
    cat "{list_lvs}"
fi
"#,
                list_lvs = list_lvs_file.display()
            ),
        );

        write_script(
            &bin.join("vgs"),
            &format!(r#"cat "{f}""#, f = vg_free_file.display()),
        );

        write_script(
            &bin.join("lsblk"),
            &format!(
                r#"
device="$3"
lv=$(echo "$device" | cut -d/ -f4)
grep "^$lv:" "{f}" | cut -d: -f2
"#,
                f = fstype_map.display()
            ),
        );

        write_script(
            &bin.join("df"),
            &format!(
                r#"
device="$3"
lv=$(echo "$device" | cut -d/ -f4)
free=$(grep "^$lv:" "{f}" | cut -d: -f2)
printf 'Filesystem 1K-blocks Used Available Use%% Mounted\n'
printf '%s 0 0 %s 0%% /mnt/%s\n' "$device" "$free" "$lv"
"#,
                f = donor_free_map.display()
            ),
        );

        write_script(
            &bin.join("pvs"),
            &format!(r#"cat "{f}""#, f = pv_list_file.display()),
        );

        write_script(
            &bin.join("lvreduce"),
            &format!(
                r#"
device="$4"
lv=$(echo "$device" | cut -d/ -f4)
amount_gb=$(echo "$3" | grep -o '[0-9]*')
amount_bytes=$((amount_gb * 1024 * 1024 * 1024))
current=$(cat "{vg_free}")
echo $((current + amount_bytes)) > "{vg_free}"
echo "lvreduce $lv" >> "{log}"
"#,
                vg_free = vg_free_file.display(),
                log = mutate_log.display()
            ),
        );

        write_script(
            &bin.join("lvextend"),
            &format!(r#"echo "lvextend $4" >> "{log}""#, log = mutate_log.display()),
        );

        write_script(
            &bin.join("pvcreate"),
            &format!(r#"echo "pvcreate $2" >> "{log}""#, log = mutate_log.display()),
        );

        write_script(
            &bin.join("vgextend"),
            &format!(
                r#"
current=$(cat "{vg_free}")
echo $((current + {fallback_bytes})) > "{vg_free}"
echo "vgextend $1 $2" >> "{log}"
"#,
                vg_free = vg_free_file.display(),
                fallback_bytes = 1024u64 * 1024 * 1024 * 4,
                log = mutate_log.display()
            ),
        );

        let old_path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{}", bin.display(), old_path));

        Fixture { _guard: guard, dir, old_path }
    }

    pub fn set_fstype(&self, lv: &str, fs_type: &str) {
        let path = self.dir.path().join("fstype_map");
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str(&format!("{lv}:{fs_type}\n"));
        fs::write(path, contents).unwrap();
    }

    pub fn set_donor_free(&self, lv: &str, bytes: i64) {
        let path = self.dir.path().join("donor_free_map");
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str(&format!("{lv}:{bytes}\n"));
        fs::write(path, contents).unwrap();
    }

    pub fn set_sibling_lvs(&self, lvs: &[&str]) {
        let path = self.dir.path().join("list_lvs");
        fs::write(path, lvs.join("\n") + "\n").unwrap();
    }

    pub fn vg_free(&self) -> i64 {
        let path = self.dir.path().join("vg_free");
        fs::read_to_string(path).unwrap().trim().parse().unwrap()
    }

    pub fn mutate_log(&self) -> String {
        let path = self.dir.path().join("mutate_log");
        fs::read_to_string(path).unwrap_or_default()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::env::set_var("PATH", &self.old_path);
    }
}
