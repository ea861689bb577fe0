use fnv::{FnvHashMap, FnvHashSet};
use session_data::Bar;
use session_instrument::{Interval, Symbol};
use std::collections::VecDeque;
use tracing::trace;

type Key = (Symbol, Interval);

/// Outcome of one [`MergeQueue::next_ready`] step.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The chronologically-next bar, ready to be yielded.
    Ready { symbol: Symbol, interval: Interval, bar: Bar },
    /// Nothing ready yet, but at least one stream is still active - the caller should keep
    /// polling (backtest: the pump hasn't produced the next batch; live: nothing has arrived).
    Empty,
    /// Every registered stream is exhausted and drained. The session has no more data.
    Exhausted,
}

/// One pending-slot-per-input chronological merge, fed either by a live adapter or by a
/// backtest data pump - both just call [`Self::feed`]. Pure and independently testable: it
/// has no knowledge of the clock, pacing, or threads, only of what order bars should come out
/// in.
#[derive(Debug, Default)]
pub struct MergeQueue {
    queues: FnvHashMap<Key, VecDeque<Bar>>,
    exhausted: FnvHashSet<Key>,
}

impl MergeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input stream so its (possible future) emptiness counts towards
    /// exhaustion. A no-op if already registered.
    pub fn register(&mut self, symbol: Symbol, interval: Interval) {
        self.queues.entry((symbol, interval)).or_default();
    }

    /// Remove a stream entirely - used by symbol removal, which drains this input
    /// immediately rather than waiting for it to exhaust naturally.
    pub fn deregister(&mut self, symbol: &Symbol, interval: &Interval) {
        let key = (symbol.clone(), interval.clone());
        self.queues.remove(&key);
        self.exhausted.remove(&key);
    }

    /// Push one bar onto `(symbol, interval)`'s pending queue. Callers are expected to feed
    /// bars in chronological order per stream; `next_ready` only merges across streams, it
    /// does not reorder within one.
    pub fn feed(&mut self, symbol: &Symbol, interval: &Interval, bar: Bar) {
        let key = (symbol.clone(), interval.clone());
        self.queues.entry(key).or_default().push_back(bar);
    }

    /// Mark a stream as having no more data to come (backtest pump reached the end of its
    /// prefetched range). Once its queue drains, it stops counting against readiness.
    pub fn mark_exhausted(&mut self, symbol: &Symbol, interval: &Interval) {
        self.exhausted.insert((symbol.clone(), interval.clone()));
    }

    pub fn is_registered(&self, symbol: &Symbol, interval: &Interval) -> bool {
        self.queues.contains_key(&(symbol.clone(), interval.clone()))
    }

    /// Pop the chronologically-next bar across every registered stream.
    ///
    /// Discards stale pending items (timestamp strictly older than `current_clock`) before
    /// picking the minimum - this is what lets a mid-session symbol add join cleanly without
    /// replaying data the session has already passed. Ties break lexicographically on
    /// `(symbol, interval)`.
    pub fn next_ready(&mut self, current_clock: chrono::DateTime<chrono::Utc>) -> MergeOutcome {
        for (key, queue) in self.queues.iter_mut() {
            while let Some(front) = queue.front() {
                if front.timestamp < current_clock {
                    trace!(symbol = %key.0, interval = key.1.as_str(), timestamp = %front.timestamp, "discarding stale pending bar");
                    queue.pop_front();
                } else {
                    break;
                }
            }
        }

        let mut best: Option<&Key> = None;
        for (key, queue) in &self.queues {
            let Some(front) = queue.front() else { continue };
            let candidate_better = match best {
                None => true,
                Some(current_best) => {
                    let current_front = self.queues[current_best].front().expect("checked non-empty");
                    (front.timestamp, key) < (current_front.timestamp, current_best)
                }
            };
            if candidate_better {
                best = Some(key);
            }
        }

        let Some(key) = best.cloned() else {
            if self.all_exhausted_and_empty() {
                return MergeOutcome::Exhausted;
            }
            return MergeOutcome::Empty;
        };

        let bar = self.queues.get_mut(&key).and_then(|q| q.pop_front()).expect("selected key has a front item");
        MergeOutcome::Ready {
            symbol: key.0,
            interval: key.1,
            bar,
        }
    }

    fn all_exhausted_and_empty(&self) -> bool {
        if self.queues.is_empty() {
            return true;
        }
        self.queues.iter().all(|(key, queue)| queue.is_empty() && self.exhausted.contains(key))
    }
}
