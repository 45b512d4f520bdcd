// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `snapshots.json`: one [`QuotaSnapshot`] per `identityKey`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::kv_store::KvStore;
use crate::rate_limit::QuotaSnapshot;

pub struct SnapshotStore {
    kv: Arc<KvStore>,
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(kv: Arc<KvStore>, path: PathBuf) -> Self {
        Self { kv, path }
    }

    pub fn get(&self, identity_key: &str) -> Option<QuotaSnapshot> {
        let file: HashMap<String, QuotaSnapshot> = self.kv.load(&self.path).unwrap_or_default();
        file.get(identity_key).cloned()
    }

    pub async fn put(&self, identity_key: &str, snapshot: QuotaSnapshot) -> anyhow::Result<()> {
        let identity_key = identity_key.to_owned();
        self.kv
            .save::<HashMap<String, QuotaSnapshot>, _>(&self.path, move |current| {
                let mut file = current.unwrap_or_default();
                file.insert(identity_key, snapshot);
                file
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
