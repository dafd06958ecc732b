//! Crawl frontier: the visited set plus the pending FIFO queue
//!
//! Every URL moves through `unseen -> queued -> fetched`:
//! - [`Frontier::offer`] inserts an unseen URL into the visited set and queues it
//! - [`Frontier::next`] pops the oldest queued URL for fetching
//!
//! The visited set only grows, so a URL is queued at most once per run and
//! popping it is irreversible. That is what guarantees the crawl terminates.
//!
//! [`SharedFrontier`] puts the whole frontier behind one mutex so concurrent
//! workers cannot both queue the same link.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Visited set and pending queue for one crawl run
#[derive(Debug, Default)]
pub struct Frontier {
    /// Every URL ever queued or implicitly fetched; never shrinks
    visited: HashSet<Url>,

    /// URLs waiting to be fetched, oldest first
    queue: VecDeque<Url>,

    /// Offers ignored because the URL was already visited
    duplicate_offers: u64,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `url` unless it has been seen before
    ///
    /// # Returns
    ///
    /// * `true` - The URL was new and is now queued
    /// * `false` - The URL was already visited; nothing changed
    pub fn offer(&mut self, url: Url) -> bool {
        if self.visited.contains(&url) {
            self.duplicate_offers += 1;
            return false;
        }

        self.visited.insert(url.clone());
        self.queue.push_back(url);
        true
    }

    /// Pops the next URL to fetch, or `None` when the queue is exhausted
    pub fn next(&mut self) -> Option<Url> {
        self.queue.pop_front()
    }

    /// Records `url` as visited without queueing it
    ///
    /// Used for redirect targets, which are fetched as part of another URL's
    /// request. Returns `false` if the URL had already been visited.
    pub fn mark_visited(&mut self, url: Url) -> bool {
        self.visited.insert(url)
    }

    /// Returns true if `url` has ever been queued or marked visited
    pub fn contains(&self, url: &Url) -> bool {
        self.visited.contains(url)
    }

    /// Number of URLs waiting to be fetched
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns whether no URLs are waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of distinct URLs seen this run
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Number of offers dropped as duplicates
    pub fn duplicate_offers(&self) -> u64 {
        self.duplicate_offers
    }
}

/// A [`Frontier`] shared between fetch workers
///
/// All transitions go through a single lock, which makes the check-then-insert
/// in `offer` atomic across workers. The lock is never held across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedFrontier {
    inner: Arc<Mutex<Frontier>>,
}

impl SharedFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the frontier for a batch of transitions
    ///
    /// A worker that panicked mid-crawl cannot leave the frontier half-updated
    /// (every method is a single collection operation), so a poisoned lock is
    /// recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, Frontier> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn offer(&self, url: Url) -> bool {
        self.lock().offer(url)
    }

    pub fn next(&self) -> Option<Url> {
        self.lock().next()
    }

    pub fn mark_visited(&self, url: Url) -> bool {
        self.lock().mark_visited(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
