//! In-memory directory of verified users
//!
//! Maps a public key to the last time it completed a challenge. Constructed
//! once per process and shared by `Arc`. A tokio Mutex serializes upserts, and
//! `last_seen` only ever moves forward, so a stale write racing a newer one
//! for the same key cannot regress it. Entries are never evicted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

/// A user that has proven possession of its private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub public_key: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a user, keeping the later of the stored and given times.
    ///
    /// Returns the record as stored.
    pub async fn record_seen(&self, public_key: &str, at: DateTime<Utc>) -> UserRecord {
        let mut users = self.users.lock().await;
        let record = users
            .entry(public_key.to_owned())
            .and_modify(|existing| {
                if at > existing.last_seen {
                    existing.last_seen = at;
                }
            })
            .or_insert_with(|| UserRecord {
                public_key: public_key.to_owned(),
                last_seen: at,
            });
        debug!(public_key, last_seen = %record.last_seen, "user recorded");
        record.clone()
    }

    pub async fn get(&self, public_key: &str) -> Option<UserRecord> {
        let users = self.users.lock().await;
        users.get(public_key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All records, sorted by public key.
    pub async fn snapshot(&self) -> Vec<UserRecord> {
        let users = self.users.lock().await;
        let mut records: Vec<UserRecord> = users.values().cloned().collect();
        records.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        records
    }
}
