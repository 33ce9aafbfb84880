//! Shared template store
//!
//! One lock guards every piece of cross-task mutable state: the per-chain
//! mining contexts, the recent-solution queue, the candidate/confirmed
//! counters, and the hash-count window. Critical sections are O(1) or
//! small-bounded and never touch the network.
//!
//! The generation counter is the cheap "something changed" signal workers
//! poll between batches. It is bumped while the lock is held but read
//! lock-free; a worker that sees it move must still compare its own chain's
//! index under the lock before abandoning work, so an unrelated chain's
//! update never kills a still-valid search.

use crate::stats::{confirmation_rate, minute_now, HashrateWindow, StatsSnapshot};
use crate::types::{Hash, MiningContext};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Capacity of the recent own-solution queue used for confirmation detection
pub const RECENT_SOLUTIONS: usize = 10;

/// Shared, lock-guarded mining state
pub struct TemplateStore {
    generation: AtomicU64,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    templates: HashMap<u64, Arc<MiningContext>>,
    window: HashrateWindow,
    recent: VecDeque<Hash>,
    candidates: u64,
    confirmed: u64,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            inner: Mutex::new(StoreInner {
                templates: HashMap::new(),
                window: HashrateWindow::new(),
                recent: VecDeque::with_capacity(RECENT_SOLUTIONS),
                candidates: 0,
                confirmed: 0,
            }),
        }
    }

    /// Current value of the invalidation counter.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Accept a new template for its chain.
    ///
    /// The context replaces the stored one only if none exists yet or its
    /// index is strictly greater; duplicates and out-of-order arrivals are
    /// silently ignored. On acceptance the generation counter is bumped and
    /// the recent-solution queue is scanned for a confirmation: a template
    /// whose `previous` hash matches one of our own submitted solutions
    /// means that solution made it into the chain.
    pub fn put(&self, context: MiningContext) -> bool {
        let mut inner = self.inner.lock();

        if let Some(current) = inner.templates.get(&context.chain()) {
            if current.index() >= context.index() {
                return false;
            }
        }

        let confirmed = inner
            .recent
            .iter()
            .any(|hash| *hash == context.header.previous);
        if confirmed {
            inner.confirmed += 1;
        }

        debug!(
            chain = context.chain(),
            index = context.index(),
            limit = context.limit,
            origin = %context.origin,
            confirmed,
            "accepted template"
        );

        inner.templates.insert(context.chain(), Arc::new(context));
        self.generation.fetch_add(1, Ordering::Release);
        true
    }

    /// Latest context for a chain, if any.
    pub fn get(&self, chain: u64) -> Option<Arc<MiningContext>> {
        self.inner.lock().templates.get(&chain).cloned()
    }

    /// Index of the stored template for a chain, if any.
    pub fn chain_index(&self, chain: u64) -> Option<u64> {
        self.inner.lock().templates.get(&chain).map(|c| c.index())
    }

    /// Flush a worker's accumulated hash attempts into the current minute.
    pub fn record_hashes(&self, count: u64) {
        self.inner.lock().window.record(minute_now(), count);
    }

    /// Account for a found candidate: flush the hash attempts that led to
    /// it, and for primary-account solutions bump the candidate counter and
    /// remember the content hash for later confirmation detection.
    pub fn record_candidate(&self, hash: Hash, hashes: u64, secondary: bool) {
        let mut inner = self.inner.lock();
        let minute = minute_now();
        inner.window.record(minute, hashes);

        if !secondary {
            inner.candidates += 1;
            if inner.recent.len() >= RECENT_SOLUTIONS {
                inner.recent.pop_front();
            }
            inner.recent.push_back(hash);
        }
    }

    /// Point-in-time statistics snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        StatsSnapshot {
            hash_rate: inner.window.average(minute_now()),
            candidates: inner.candidates,
            confirmed: inner.confirmed,
            confirmation_rate: confirmation_rate(inner.candidates, inner.confirmed),
        }
    }

    /// Stored (chain, index) pairs, for status reporting.
    pub fn chains(&self) -> Vec<(u64, u64)> {
        let inner = self.inner.lock();
        let mut chains: Vec<_> = inner
            .templates
            .values()
            .map(|c| (c.chain(), c.index()))
            .collect();
        chains.sort_unstable();
        chains
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, BlockHeader, ADDRESS_LEN, HASH_LEN};
    use secp256k1::SecretKey;

    fn context(chain: u64, index: u64) -> MiningContext {
        context_with_previous(chain, index, Hash::default())
    }

    fn context_with_previous(chain: u64, index: u64, previous: Hash) -> MiningContext {
        MiningContext {
            header: BlockHeader {
                time: 0,
                previous,
                parent: Hash::default(),
                left_child: Hash::default(),
                right_child: Hash::default(),
                trans_list_hash: Hash::default(),
                producer: Address([0u8; ADDRESS_LEN]),
                chain,
                index,
                nonce: 0,
            },
            limit: 10,
            origin: "127.0.0.1:9090".into(),
            key: SecretKey::from_byte_array(&[7u8; 32]).unwrap(),
            secondary: false,
        }
    }

    #[test]
    fn test_put_keeps_highest_index_in_either_order() {
        let store = TemplateStore::new();
        assert!(store.put(context(1, 5)));
        assert!(store.put(context(1, 7)));
        assert_eq!(store.chain_index(1), Some(7));

        let store = TemplateStore::new();
        assert!(store.put(context(1, 7)));
        assert!(!store.put(context(1, 5)));
        assert_eq!(store.chain_index(1), Some(7));
    }

    #[test]
    fn test_out_of_order_and_duplicate_ignored() {
        let store = TemplateStore::new();
        assert!(store.put(context(2, 9)));
        assert!(!store.put(context(2, 8)));
        assert!(!store.put(context(2, 9)));
        assert_eq!(store.chain_index(2), Some(9));
        assert_eq!(store.get(2).unwrap().index(), 9);
    }

    #[test]
    fn test_generation_bumps_only_on_accept() {
        let store = TemplateStore::new();
        let before = store.generation();

        store.put(context(1, 3));
        assert_eq!(store.generation(), before + 1);

        // Rejected arrivals leave the counter alone.
        store.put(context(1, 2));
        assert_eq!(store.generation(), before + 1);

        // Another chain's accept still bumps the shared counter.
        store.put(context(2, 1));
        assert_eq!(store.generation(), before + 2);
    }

    #[test]
    fn test_chains_are_independent() {
        let store = TemplateStore::new();
        store.put(context(1, 10));
        store.put(context(2, 3));
        assert_eq!(store.chain_index(1), Some(10));
        assert_eq!(store.chain_index(2), Some(3));
        assert_eq!(store.chain_index(3), None);
        assert_eq!(store.chains(), vec![(1, 10), (2, 3)]);
    }

    #[test]
    fn test_confirmation_on_matching_previous() {
        let store = TemplateStore::new();
        let solution = Hash([0xaa; HASH_LEN]);
        store.record_candidate(solution, 512, false);

        // Matching previous hash confirms exactly once.
        assert!(store.put(context_with_previous(1, 1, solution)));
        assert_eq!(store.snapshot().confirmed, 1);

        // Non-matching previous hash does not.
        assert!(store.put(context_with_previous(1, 2, Hash([0xbb; HASH_LEN]))));
        assert_eq!(store.snapshot().confirmed, 1);
    }

    #[test]
    fn test_recent_queue_bounded_fifo() {
        let store = TemplateStore::new();
        let hashes: Vec<Hash> = (0u8..11).map(|i| Hash([i + 1; HASH_LEN])).collect();
        for hash in &hashes {
            store.record_candidate(*hash, 1, false);
        }

        // The first of the eleven was evicted; no confirmation for it.
        store.put(context_with_previous(1, 1, hashes[0]));
        assert_eq!(store.snapshot().confirmed, 0);

        // The second is still queued.
        store.put(context_with_previous(1, 2, hashes[1]));
        assert_eq!(store.snapshot().confirmed, 1);
    }

    #[test]
    fn test_secondary_candidates_not_counted() {
        let store = TemplateStore::new();
        let hash = Hash([0xcc; HASH_LEN]);
        store.record_candidate(hash, 256, true);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.candidates, 0);

        // Secondary solutions never enter the confirmation queue.
        store.put(context_with_previous(1, 1, hash));
        assert_eq!(store.snapshot().confirmed, 0);
    }

    #[test]
    fn test_snapshot_confirmation_rate() {
        let store = TemplateStore::new();
        assert_eq!(store.snapshot().confirmation_rate, 0.0);

        let solution = Hash([0xdd; HASH_LEN]);
        store.record_candidate(solution, 1, false);
        store.record_candidate(Hash([0xee; HASH_LEN]), 1, false);
        store.put(context_with_previous(1, 1, solution));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.candidates, 2);
        assert_eq!(snapshot.confirmed, 1);
        assert_eq!(snapshot.confirmation_rate, 50.0);
    }
}
