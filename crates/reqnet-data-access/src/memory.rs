//! In-memory collaborators for tests and local development
//!
//! Both support fault injection: queued failures are consumed one per call,
//! in order, before the call touches any state.

use crate::error::{CollaboratorError, ErrorKind};
use crate::traits::{AnchorMetadata, ChainAnchor, ChainIndexer, ConfirmedAnchor, ContentStore};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqnet_crypto::{content_address_for, keccak256};
use reqnet_primitives::{AnchorTxRef, BlockOrder, ChannelId, ContentAddress, Timestamp, Topic};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Timestamp of block 0
const GENESIS_TIMESTAMP: Timestamp = 1_700_000_000;

/// Seconds between blocks
const BLOCK_TIME: Timestamp = 12;

/// Queue of injected failures
#[derive(Default)]
struct Faults {
    queue: Mutex<VecDeque<CollaboratorError>>,
}

impl Faults {
    fn push(&self, kind: ErrorKind, times: usize, message: &str) {
        let mut queue = self.queue.lock();
        for _ in 0..times {
            queue.push_back(CollaboratorError::new(kind, message));
        }
    }

    fn next(&self) -> Result<(), CollaboratorError> {
        match self.queue.lock().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Content store backed by a map; addresses are SHA-256 digests
#[derive(Default)]
pub struct MemoryContentStore {
    contents: Mutex<HashMap<ContentAddress, Bytes>>,
    put_faults: Faults,
    get_faults: Faults,
    put_calls: AtomicU64,
    get_calls: AtomicU64,
}

impl MemoryContentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` puts with `kind`
    pub fn fail_puts(&self, kind: ErrorKind, times: usize) {
        self.put_faults.push(kind, times, "injected put failure");
    }

    /// Fail the next `times` gets with `kind`
    pub fn fail_gets(&self, kind: ErrorKind, times: usize) {
        self.get_faults.push(kind, times, "injected get failure");
    }

    /// Store bytes under an arbitrary address
    pub fn insert_raw(&self, address: ContentAddress, data: Bytes) {
        self.contents.lock().insert(address, data);
    }

    /// Drop stored content
    pub fn remove(&self, address: &ContentAddress) -> Option<Bytes> {
        self.contents.lock().remove(address)
    }

    /// Check if content is stored
    pub fn contains(&self, address: &ContentAddress) -> bool {
        self.contents.lock().contains_key(address)
    }

    /// Number of stored contents
    pub fn len(&self) -> usize {
        self.contents.lock().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls to `put`, including failed ones
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Calls to `get`, including failed ones
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: Bytes) -> Result<ContentAddress, CollaboratorError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.put_faults.next()?;
        let address = content_address_for(&data);
        self.contents.lock().insert(address.clone(), data);
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Bytes, CollaboratorError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.get_faults.next()?;
        self.contents
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found(format!("no content at {}", address)))
    }
}

/// Anchor waiting to be mined
#[derive(Clone, Debug)]
struct MempoolAnchor {
    content_address: ContentAddress,
    anchor_tx_ref: AnchorTxRef,
    metadata: AnchorMetadata,
}

/// Anchor included in a block
#[derive(Clone, Debug)]
struct IndexedAnchor {
    channel_id: ChannelId,
    topics: Vec<Topic>,
    anchor: ConfirmedAnchor,
}

#[derive(Default)]
struct ChainState {
    mempool: Vec<MempoolAnchor>,
    indexed: Vec<IndexedAnchor>,
    block_number: u64,
}

/// Simulated chain: anchors go to a mempool and become visible to the
/// indexer once a block is mined.
#[derive(Default)]
pub struct MemoryChain {
    state: Mutex<ChainState>,
    nonce: AtomicU64,
    submit_faults: Faults,
    query_faults: Faults,
    indexer_down: AtomicBool,
    submit_calls: AtomicU64,
    query_calls: AtomicU64,
}

impl MemoryChain {
    /// Create a chain at block 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` submits with a connection error
    pub fn fail_submits(&self, times: usize) {
        self.submit_faults
            .push(ErrorKind::Connection, times, "injected anchor connection failure");
    }

    /// Reject the next submit
    pub fn reject_next_submit(&self, reason: &str) {
        self.submit_faults.push(ErrorKind::Rejected, 1, reason);
    }

    /// Fail the next `times` indexer queries with a connection error
    pub fn fail_queries(&self, times: usize) {
        self.query_faults
            .push(ErrorKind::Connection, times, "injected indexer connection failure");
    }

    /// Make every indexer query fail until switched back
    pub fn set_indexer_down(&self, down: bool) {
        self.indexer_down.store(down, Ordering::SeqCst);
    }

    /// Current block number
    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Anchors waiting in the mempool
    pub fn mempool_len(&self) -> usize {
        self.state.lock().mempool.len()
    }

    /// Calls to `submit`, including failed ones
    pub fn submit_calls(&self) -> u64 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Calls to the indexer, including failed ones
    pub fn query_calls(&self) -> u64 {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Mine the mempool into a new block, in submission order.
    ///
    /// Returns the new block number.
    pub fn mine_block(&self) -> u64 {
        let mut state = self.state.lock();
        state.block_number += 1;
        let block_number = state.block_number;
        let mempool = std::mem::take(&mut state.mempool);
        for (index, pending) in mempool.into_iter().enumerate() {
            let order = BlockOrder::new(block_number, index as u32);
            state.indexed.push(Self::index(pending, order));
        }
        block_number
    }

    /// Mine a single mempool anchor at an explicit position.
    ///
    /// Returns false when the anchor is not in the mempool.
    pub fn confirm_at(&self, anchor_tx_ref: &AnchorTxRef, order: BlockOrder) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state
            .mempool
            .iter()
            .position(|p| &p.anchor_tx_ref == anchor_tx_ref)
        else {
            return false;
        };
        let pending = state.mempool.remove(index);
        state.block_number = state.block_number.max(order.block_number);
        state.indexed.push(Self::index(pending, order));
        true
    }

    /// Add an already confirmed anchor, bypassing the mempool
    pub fn insert_confirmed(&self, channel_id: ChannelId, topics: Vec<Topic>, anchor: ConfirmedAnchor) {
        let mut state = self.state.lock();
        state.block_number = state.block_number.max(anchor.block_order.block_number);
        state.indexed.push(IndexedAnchor {
            channel_id,
            topics,
            anchor,
        });
    }

    fn index(pending: MempoolAnchor, block_order: BlockOrder) -> IndexedAnchor {
        IndexedAnchor {
            channel_id: pending.metadata.channel_id,
            topics: pending.metadata.topics,
            anchor: ConfirmedAnchor {
                content_address: pending.content_address,
                anchor_tx_ref: pending.anchor_tx_ref,
                block_order,
                block_timestamp: GENESIS_TIMESTAMP + block_order.block_number * BLOCK_TIME,
            },
        }
    }

    fn check_indexer(&self) -> Result<(), CollaboratorError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.indexer_down.load(Ordering::SeqCst) {
            return Err(CollaboratorError::connection("indexer unreachable"));
        }
        self.query_faults.next()
    }
}

#[async_trait]
impl ChainAnchor for MemoryChain {
    async fn submit(
        &self,
        address: &ContentAddress,
        metadata: &AnchorMetadata,
    ) -> Result<AnchorTxRef, CollaboratorError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submit_faults.next()?;

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut preimage = address.as_str().as_bytes().to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        let anchor_tx_ref = AnchorTxRef::new(keccak256(&preimage));

        self.state.lock().mempool.push(MempoolAnchor {
            content_address: address.clone(),
            anchor_tx_ref,
            metadata: metadata.clone(),
        });
        Ok(anchor_tx_ref)
    }
}

#[async_trait]
impl ChainIndexer for MemoryChain {
    async fn query_confirmed(&self, channel: &ChannelId) -> Result<Vec<ConfirmedAnchor>, CollaboratorError> {
        self.check_indexer()?;
        Ok(self
            .state
            .lock()
            .indexed
            .iter()
            .filter(|i| &i.channel_id == channel)
            .map(|i| i.anchor.clone())
            .collect())
    }

    async fn query_channels_by_topics(&self, topics: &[Topic]) -> Result<Vec<ChannelId>, CollaboratorError> {
        self.check_indexer()?;
        let channels: BTreeSet<ChannelId> = self
            .state
            .lock()
            .indexed
            .iter()
            .filter(|i| i.topics.iter().any(|t| topics.contains(t)))
            .map(|i| i.channel_id)
            .collect();
        Ok(channels.into_iter().collect())
    }
}
