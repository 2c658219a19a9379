//! Pending store implementation

use crate::error::{PendingError, PendingResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use reqnet_primitives::{
    current_timestamp, AnchorTxRef, ChannelId, ContentAddress, Timestamp, Topic, H256,
};
use reqnet_types::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 256;

fn default_max_age_secs() -> u64 {
    600
}

fn default_max_entries() -> usize {
    10_000
}

fn default_max_per_channel() -> usize {
    256
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Age after which an unconfirmed entry is pruned
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Maximum number of pending entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Maximum pending entries per channel
    #[serde(default = "default_max_per_channel")]
    pub max_per_channel: usize,
}

impl PendingConfig {
    /// Prune age as a duration
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            max_entries: default_max_entries(),
            max_per_channel: default_max_per_channel(),
        }
    }
}

/// Lifecycle of a pending entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PendingStatus {
    /// Anchored, waiting for the indexer
    Submitted,
    /// Reported by the indexer
    Confirmed,
    /// Never confirmed, pruned
    Failed,
}

/// Submitted transaction awaiting confirmation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    /// Channel
    pub channel_id: ChannelId,
    /// Address of the stored envelope
    pub content_address: ContentAddress,
    /// Keccak-256 of the stored envelope
    pub content_hash: H256,
    /// Topics the channel was submitted under
    pub topics: Vec<Topic>,
    /// Submission time (seconds)
    pub submitted_at: Timestamp,
    /// Anchoring transaction
    pub anchor_tx_ref: AnchorTxRef,
    /// Status
    pub status: PendingStatus,
    /// Transaction, without position
    pub transaction: Transaction,
}

/// Notification emitted by the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingEvent {
    /// Entry registered
    Registered(PendingEntry),
    /// Entry promoted by the indexer
    Confirmed(PendingEntry),
    /// Entry pruned without confirmation
    Failed(PendingEntry),
}

/// Entry with its registration sequence number
#[derive(Clone)]
struct Stored {
    seq: u64,
    entry: PendingEntry,
}

/// Entries of one channel, in submission order
#[derive(Default)]
struct ChannelEntries {
    order: Vec<AnchorTxRef>,
}

/// Pending store
pub struct PendingStore {
    /// Configuration
    config: PendingConfig,
    /// Entries by anchor reference
    by_ref: DashMap<AnchorTxRef, Stored>,
    /// Anchor reference by content address
    by_content: DashMap<ContentAddress, AnchorTxRef>,
    /// Submission order per channel
    by_channel: DashMap<ChannelId, RwLock<ChannelEntries>>,
    /// Entry count
    count: AtomicUsize,
    /// Next registration sequence number
    next_seq: AtomicU64,
    /// Pruned entries not yet reported
    failed: Mutex<Vec<PendingEntry>>,
    /// Event sender
    events: broadcast::Sender<PendingEvent>,
}

impl PendingStore {
    /// Create new store with config
    pub fn new(config: PendingConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            by_ref: DashMap::new(),
            by_content: DashMap::new(),
            by_channel: DashMap::new(),
            count: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            failed: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Create store with default config
    pub fn with_defaults() -> Self {
        Self::new(PendingConfig::default())
    }

    /// Store configuration
    pub fn config(&self) -> &PendingConfig {
        &self.config
    }

    /// Check that `channel` can take another entry.
    ///
    /// Lets callers refuse work before it has external effects; `add`
    /// enforces the same limits.
    pub fn check_capacity(&self, channel: &ChannelId) -> PendingResult<()> {
        if self.count.load(Ordering::SeqCst) >= self.config.max_entries {
            return Err(PendingError::StoreFull(self.config.max_entries));
        }
        let channel_len = self.by_channel.get(channel).map_or(0, |channel_entry| {
            let entries = channel_entry.read();
            entries.order.len()
        });
        if channel_len >= self.config.max_per_channel {
            return Err(PendingError::ChannelFull {
                channel: *channel,
                max: self.config.max_per_channel,
            });
        }
        Ok(())
    }

    /// Register a submitted entry
    pub fn add(&self, mut entry: PendingEntry) -> PendingResult<()> {
        entry.status = PendingStatus::Submitted;
        entry.transaction.position = None;
        let anchor = entry.anchor_tx_ref;
        let channel = entry.channel_id;

        let channel_entry = self
            .by_channel
            .entry(channel)
            .or_insert_with(|| RwLock::new(ChannelEntries::default()));
        let mut entries = channel_entry.write();

        // Lock order: channel, anchor index, content index
        let ref_slot = match self.by_ref.entry(anchor) {
            Entry::Occupied(_) => return Err(PendingError::DuplicateEntry(anchor)),
            Entry::Vacant(slot) => slot,
        };
        let content_slot = match self.by_content.entry(entry.content_address.clone()) {
            Entry::Occupied(_) => return Err(PendingError::DuplicateContent(entry.content_address)),
            Entry::Vacant(slot) => slot,
        };

        // Check store limits
        if entries.order.len() >= self.config.max_per_channel {
            return Err(PendingError::ChannelFull {
                channel,
                max: self.config.max_per_channel,
            });
        }
        let max_entries = self.config.max_entries;
        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max_entries).then_some(n + 1)
            })
            .map_err(|_| PendingError::StoreFull(max_entries))?;

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        content_slot.insert(anchor);
        ref_slot.insert(Stored {
            seq,
            entry: entry.clone(),
        });
        entries.order.push(anchor);

        debug!(
            channel = %channel,
            anchor = %anchor,
            content = %entry.content_address,
            "Registered pending entry"
        );
        let _ = self.events.send(PendingEvent::Registered(entry));
        Ok(())
    }

    /// Promote the entry anchored with `content_address`.
    ///
    /// Returns the entry with status `Confirmed`, or `None` when nothing is
    /// pending for that address (already promoted or never registered).
    pub fn mark_confirmed(&self, content_address: &ContentAddress) -> Option<PendingEntry> {
        let anchor = *self.by_content.get(content_address)?;
        let mut entry = self.remove(&anchor)?.entry;
        entry.status = PendingStatus::Confirmed;

        info!(
            channel = %entry.channel_id,
            anchor = %anchor,
            content = %content_address,
            "Pending entry confirmed"
        );
        let _ = self.events.send(PendingEvent::Confirmed(entry.clone()));
        Some(entry)
    }

    /// Remove entry by anchor reference
    fn remove(&self, anchor: &AnchorTxRef) -> Option<Stored> {
        let channel = self.by_ref.get(anchor).map(|s| s.entry.channel_id)?;

        let removed = {
            let channel_entry = self.by_channel.get(&channel)?;
            let mut entries = channel_entry.write();
            let (_, stored) = self.by_ref.remove(anchor)?;
            entries.order.retain(|r| r != anchor);
            self.by_content
                .remove_if(&stored.entry.content_address, |_, r| r == anchor);
            self.count.fetch_sub(1, Ordering::SeqCst);
            stored
        };

        self.by_channel
            .remove_if(&channel, |_, entries| entries.read().order.is_empty());
        Some(removed)
    }

    /// Entries of a channel not yet confirmed, in submission order
    pub fn list_pending(&self, channel: &ChannelId) -> Vec<PendingEntry> {
        let Some(channel_entry) = self.by_channel.get(channel) else {
            return Vec::new();
        };
        let entries = channel_entry.read();
        entries
            .order
            .iter()
            .filter_map(|anchor| self.by_ref.get(anchor).map(|s| s.entry.clone()))
            .collect()
    }

    /// Prune entries older than `max_age`
    pub fn prune(&self, max_age: Duration) -> Vec<PendingEntry> {
        self.prune_at(max_age, current_timestamp())
    }

    /// Prune entries older than `max_age` as of `now`.
    ///
    /// Pruned entries are returned in submission order with status `Failed`
    /// and queued for [`take_failed`](Self::take_failed).
    pub fn prune_at(&self, max_age: Duration, now: Timestamp) -> Vec<PendingEntry> {
        let max_age = max_age.as_secs();
        let expired: Vec<AnchorTxRef> = self
            .by_ref
            .iter()
            .filter(|s| now.saturating_sub(s.entry.submitted_at) > max_age)
            .map(|s| *s.key())
            .collect();

        let mut pruned: Vec<Stored> = expired
            .iter()
            .filter_map(|anchor| self.remove(anchor))
            .collect();
        pruned.sort_by_key(|s| s.seq);

        let pruned: Vec<PendingEntry> = pruned
            .into_iter()
            .map(|s| {
                let mut entry = s.entry;
                entry.status = PendingStatus::Failed;
                entry
            })
            .collect();

        if !pruned.is_empty() {
            info!(count = pruned.len(), max_age_secs = max_age, "Pruned unconfirmed entries");
            self.failed.lock().extend(pruned.iter().cloned());
            for entry in &pruned {
                let _ = self.events.send(PendingEvent::Failed(entry.clone()));
            }
        }
        pruned
    }

    /// Drain failure notifications queued by pruning
    pub fn take_failed(&self) -> Vec<PendingEntry> {
        std::mem::take(&mut *self.failed.lock())
    }

    /// Find a pending entry of `channel` by envelope hash
    pub fn find_by_content(&self, channel: &ChannelId, content_hash: &H256) -> Option<PendingEntry> {
        self.list_pending(channel)
            .into_iter()
            .find(|e| &e.content_hash == content_hash)
    }

    /// Get entry by anchor reference
    pub fn get_by_ref(&self, anchor: &AnchorTxRef) -> Option<PendingEntry> {
        self.by_ref.get(anchor).map(|s| s.entry.clone())
    }

    /// Channels with a pending entry submitted under `topic`, sorted
    pub fn channels_with_topic(&self, topic: &Topic) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self
            .by_ref
            .iter()
            .filter(|s| s.entry.topics.contains(topic))
            .map(|s| s.entry.channel_id)
            .collect();
        channels.sort();
        channels.dedup();
        channels
    }

    /// Subscribe to store events
    pub fn subscribe(&self) -> broadcast::Receiver<PendingEvent> {
        self.events.subscribe()
    }

    /// Get total number of pending entries
    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.by_channel.clear();
        self.by_ref.clear();
        self.by_content.clear();
        self.count.store(0, Ordering::SeqCst);
    }
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
