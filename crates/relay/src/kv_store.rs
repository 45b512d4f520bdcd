// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON key/value persistence: one value per path, temp-file + rename,
//! 0600 permissions, best-effort fsync, single-writer serialization per path.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

/// Serializes concurrent writers to the same path within this process, and
/// (via a directory-level advisory lock) across processes.
#[derive(Default)]
pub struct KvStore {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the JSON value at `path`. Missing file or invalid JSON are both
    /// treated as "no prior value".
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Load-mutate-store under the per-path lock. `update` receives the
    /// current value (or `None` if absent) and returns the value to persist.
    pub async fn save<T, F>(&self, path: &Path, update: F) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let path_lock = self.lock_for(path).await;
        let _guard = path_lock.lock().await;

        let current = self.load::<T>(path);
        let next = update(current);
        write_atomic(path, &next)?;
        Ok(next)
    }

    async fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(path.to_path_buf()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Acquire an advisory lock on the parent directory of `path`, retrying with
/// backoff, to serialize writers across processes sharing the same state dir.
fn lock_parent_dir(path: &Path) -> anyhow::Result<Option<File>> {
    let Some(parent) = path.parent() else { return Ok(None) };
    if parent.as_os_str().is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(parent)?;
    let dir = File::open(parent)?;

    let mut delay = std::time::Duration::from_millis(5);
    for _ in 0..8 {
        match dir.try_lock_exclusive() {
            Ok(()) => return Ok(Some(dir)),
            Err(_) => std::thread::sleep(delay),
        }
        delay = (delay * 2).min(std::time::Duration::from_millis(200));
    }
    // Bounded retries exhausted; proceed without the cross-process lock
    // rather than block indefinitely — the in-process mutex still applies.
    Ok(None)
}

/// Write `value` to `path` atomically: serialize, write to a sibling temp
/// file, fsync (best-effort), rename over the target, fsync the parent
/// directory (best-effort), then chmod 0600 (best-effort).
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let dir_lock = lock_parent_dir(path)?;

    let json = serde_json::to_string_pretty(value)?;
    let mut json = json;
    json.push('\n');

    let rand_suffix = uuid::Uuid::new_v4().simple().to_string();
    let tmp_path = PathBuf::from(format!("{}.tmp.{rand_suffix}", path.display()));
    {
        let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        let _ = file.sync_all();
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    set_owner_only_permissions(path);
    drop(dir_lock);
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    // EACCES/EPERM on the chmod (e.g. read-only or foreign-owned filesystems)
    // are swallowed; the write itself already succeeded.
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) {}

#[cfg(test)]
#[path = "kv_store_tests.rs"]
mod tests;
