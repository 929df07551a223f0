use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use http::Method;
use tokio::sync::watch;

use crate::error::Error;
use crate::response::Response;
use crate::util::lock_unpoisoned;

pub(crate) const MAX_DEDUPE_MAP_SIZE: usize = 1000;

pub(crate) type SharedOutcome = Result<Response, Error>;

/// Dedup is applied only to safe methods on clients that opted in, and only
/// when retries cannot kick in (a shared lifecycle across retrying waiters is
/// deliberately avoided).
pub(crate) fn dedupe_applies(enabled: bool, method: &Method, max_attempts: u32) -> bool {
    enabled && (*method == Method::GET || *method == Method::HEAD) && max_attempts <= 1
}

pub(crate) fn dedupe_key(method: &Method, url: &str, body_fingerprint: &str) -> String {
    format!("{method}:{url}:{body_fingerprint}")
}

struct Entry {
    generation: u64,
    sender: watch::Sender<Option<SharedOutcome>>,
}

#[derive(Default)]
struct DedupeInner {
    entries: HashMap<String, Entry>,
    // One slot per live entry, oldest first; settle and eviction both retire
    // slots, so the queue never outgrows the map.
    insertion_order: VecDeque<(String, u64)>,
    next_generation: u64,
}

/// Claim for the executing (leader) call; settling publishes the outcome to
/// every follower and removes the entry so later calls re-execute.
pub(crate) struct DedupeLease {
    key: String,
    generation: u64,
    sender: watch::Sender<Option<SharedOutcome>>,
}

pub(crate) enum DedupeClaim {
    Leader(DedupeLease),
    Follower(watch::Receiver<Option<SharedOutcome>>),
}

/// Bounded registry of in-flight deduplicated calls, keyed by
/// `METHOD:URL:BODYFINGERPRINT`. At most [`MAX_DEDUPE_MAP_SIZE`] entries are
/// resident; the oldest by insertion is evicted first when full.
#[derive(Default)]
pub(crate) struct DedupeMap {
    inner: Mutex<DedupeInner>,
}

impl DedupeMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn claim(&self, key: &str) -> DedupeClaim {
        let mut inner = lock_unpoisoned(&self.inner);
        if let Some(entry) = inner.entries.get(key) {
            return DedupeClaim::Follower(entry.sender.subscribe());
        }

        while inner.entries.len() >= MAX_DEDUPE_MAP_SIZE {
            let Some((oldest_key, oldest_generation)) = inner.insertion_order.pop_front() else {
                break;
            };
            // Only evict the entry this slot was minted for; a same-key
            // replacement claimed later must keep its dedup slot.
            let matches_slot = inner
                .entries
                .get(&oldest_key)
                .is_some_and(|entry| entry.generation == oldest_generation);
            if matches_slot {
                inner.entries.remove(&oldest_key);
                break;
            }
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;
        let (sender, _receiver) = watch::channel(None);
        inner.entries.insert(
            key.to_owned(),
            Entry {
                generation,
                sender: sender.clone(),
            },
        );
        inner.insertion_order.push_back((key.to_owned(), generation));
        DedupeClaim::Leader(DedupeLease {
            key: key.to_owned(),
            generation,
            sender,
        })
    }

    /// Remove the entry and its order slot, then publish. Removal happens
    /// first so a call arriving after settle never observes the prior result.
    pub(crate) fn settle(&self, lease: DedupeLease, outcome: SharedOutcome) {
        {
            let mut inner = lock_unpoisoned(&self.inner);
            let matches_lease = inner
                .entries
                .get(&lease.key)
                .is_some_and(|entry| entry.generation == lease.generation);
            if matches_lease {
                inner.entries.remove(&lease.key);
            }
            // Retire this lease's slot; an evicted lease's slot is already
            // gone and a same-key replacement keeps its own.
            let slot = inner
                .insertion_order
                .iter()
                .position(|(key, generation)| *generation == lease.generation && *key == lease.key);
            if let Some(slot) = slot {
                inner.insertion_order.remove(slot);
            }
        }
        let _ = lease.sender.send(Some(outcome));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock_unpoisoned(&self.inner).entries.len()
    }

    #[cfg(test)]
    fn order_len(&self) -> usize {
        lock_unpoisoned(&self.inner).insertion_order.len()
    }
}

/// Wait for the leader's outcome. A leader that disappears without settling
/// (task aborted) surfaces as a network failure to its followers.
pub(crate) async fn await_shared(
    mut receiver: watch::Receiver<Option<SharedOutcome>>,
) -> SharedOutcome {
    match receiver.wait_for(|slot| slot.is_some()).await {
        Ok(settled) => settled
            .clone()
            .unwrap_or_else(|| Err(Error::network("deduplicated request was abandoned"))),
        Err(_) => Err(Error::network("deduplicated request was abandoned")),
    }
}
