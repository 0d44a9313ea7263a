use crate::api::models::Track;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Coarse priority class. Requested tracks always play before playlist
/// tracks, whenever they were enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Requested = 0,
    Playlist = 1,
}

/// Ordering key of an entry: band first, then enqueue time, then serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueKey {
    pub band: Band,
    pub timestamp: i64,
    pub serial: u64,
}

/// Persisted form of one queued track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub band: Band,
    pub timestamp: i64,
    pub serial: u64,
    pub track: Track,
}

impl QueueEntry {
    pub fn key(&self) -> QueueKey {
        QueueKey {
            band: self.band,
            timestamp: self.timestamp,
            serial: self.serial,
        }
    }
}

/// Priority-ordered queue with one entry per track id.
///
/// The ordered map and the id set are only ever changed together.
#[derive(Debug, Default)]
pub struct PlayQueue {
    entries: BTreeMap<QueueKey, Track>,
    queued_ids: HashSet<String>,
    next_serial: u64,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted list. Later duplicates of an id are dropped.
    pub fn from_entries(entries: Vec<QueueEntry>) -> Self {
        let mut queue = Self::new();
        let mut sorted = entries;
        sorted.sort_by_key(|e| e.key());
        for entry in sorted {
            queue.next_serial = queue.next_serial.max(entry.serial + 1);
            if !queue.enqueue(entry) {
                log::warn!("Dropping duplicate persisted queue entry");
            }
        }
        queue
    }

    /// Snapshot of every entry in play order.
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.entries
            .iter()
            .map(|(key, track)| QueueEntry {
                band: key.band,
                timestamp: key.timestamp,
                serial: key.serial,
                track: track.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.queued_ids.contains(track_id)
    }

    /// Insert an entry unless its track is already queued.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        if self.queued_ids.contains(&entry.track.id) {
            return false;
        }
        self.queued_ids.insert(entry.track.id.clone());
        self.entries.insert(entry.key(), entry.track);
        true
    }

    /// Queue a track in `band`, stamped with `timestamp` and the next serial.
    pub fn enqueue_track(&mut self, band: Band, timestamp: i64, track: Track) -> bool {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.enqueue(QueueEntry {
            band,
            timestamp,
            serial,
            track,
        })
    }

    /// Remove and return the highest-priority entry.
    pub fn dequeue(&mut self) -> Option<QueueEntry> {
        let (key, track) = self.entries.pop_first()?;
        self.queued_ids.remove(&track.id);
        Some(QueueEntry {
            band: key.band,
            timestamp: key.timestamp,
            serial: key.serial,
            track,
        })
    }

    /// Remove every entry of `band`, leaving the other band untouched.
    pub fn drain_band(&mut self, band: Band) -> usize {
        let before = self.entries.len();
        let queued_ids = &mut self.queued_ids;
        self.entries.retain(|key, track| {
            if key.band == band {
                queued_ids.remove(&track.id);
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    pub fn band_len(&self, band: Band) -> usize {
        self.entries.keys().filter(|key| key.band == band).count()
    }
}
