//! Gateway block/tx flow statistics (§4.7).
//!
//! Grounded on the upstream gateway's interval-bucketed stats service: one
//! open interval of counters, rolled into a bounded history ring when
//! closed. Per the "global singleton" redesign flag (§9), this is an
//! explicitly constructed collaborator passed into the pipeline rather than
//! a process-wide value.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Default number of closed intervals retained in history.
const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Counters for a single statistics interval.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayStatsInterval {
    /// Full blocks received from the local blockchain node.
    pub blocks_received_from_node: u64,
    /// Full blocks received (reconstructed or relayed) from the BDN.
    pub blocks_received_from_bdn: u64,
    /// Blocks dropped because their hash was already in [`crate::seen_blocks::SeenBlocks`].
    pub blocks_ignored_seen: u64,
    /// Transactions received from the local blockchain node.
    pub tx_received_from_node: u64,
    /// Transactions received from the BDN.
    pub tx_received_from_bdn: u64,
    /// Partial reconstructions that completed via recovery.
    pub recoveries_completed: u64,
    /// Partial reconstructions whose deadline elapsed.
    pub recovery_timeouts: u64,
    /// Recovery attempts rejected for a missing/recovered count mismatch.
    pub recovery_mismatches: u64,
}

/// Interval-bucketed counters of gateway block/tx flow, with a bounded
/// history of closed intervals.
///
/// Unlike the reference node's node-wide metrics collector (storage, RPC,
/// system), this service only covers what the dispatch pipeline needs to
/// report.
#[derive(Debug)]
pub struct GatewayStats {
    inner: Mutex<Inner>,
    history_capacity: usize,
}

#[derive(Debug)]
struct Inner {
    current: GatewayStatsInterval,
    opened_at: Instant,
    history: VecDeque<(GatewayStatsInterval, Duration)>,
}

impl GatewayStats {
    /// Creates a stats collector with the default history capacity.
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Creates a stats collector retaining at most `history_capacity` closed intervals.
    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: GatewayStatsInterval::default(),
                opened_at: Instant::now(),
                history: VecDeque::with_capacity(history_capacity.min(256)),
            }),
            history_capacity,
        }
    }

    fn with_current<F: FnOnce(&mut GatewayStatsInterval)>(&self, f: F) {
        let mut inner = self.inner.lock().expect("gateway stats lock poisoned");
        f(&mut inner.current);
    }

    /// Records a full block received from the local node.
    pub fn record_block_from_node(&self) {
        self.with_current(|c| c.blocks_received_from_node += 1);
    }

    /// Records a full block received from the BDN.
    pub fn record_block_from_bdn(&self) {
        self.with_current(|c| c.blocks_received_from_bdn += 1);
    }

    /// Records a block dropped as an already-seen duplicate.
    pub fn record_block_ignored_seen(&self) {
        self.with_current(|c| c.blocks_ignored_seen += 1);
    }

    /// Records a transaction received from the local node.
    pub fn record_tx_from_node(&self) {
        self.with_current(|c| c.tx_received_from_node += 1);
    }

    /// Records a transaction received from the BDN.
    pub fn record_tx_from_bdn(&self) {
        self.with_current(|c| c.tx_received_from_bdn += 1);
    }

    /// Records a recovery that completed successfully.
    pub fn record_recovery_completed(&self) {
        self.with_current(|c| c.recoveries_completed += 1);
    }

    /// Records a recovery abandoned after its deadline elapsed.
    pub fn record_recovery_timeout(&self) {
        self.with_current(|c| c.recovery_timeouts += 1);
    }

    /// Records a recovery rejected for a missing/recovered count mismatch.
    pub fn record_recovery_mismatch(&self) {
        self.with_current(|c| c.recovery_mismatches += 1);
    }

    /// A snapshot of the currently-open interval's counters.
    pub fn current(&self) -> GatewayStatsInterval {
        self.inner.lock().expect("gateway stats lock poisoned").current
    }

    /// Closes the current interval, pushing it (with its elapsed duration)
    /// onto the bounded history ring, and opens a fresh interval.
    pub fn close_interval(&self) -> GatewayStatsInterval {
        let mut inner = self.inner.lock().expect("gateway stats lock poisoned");
        let closed = inner.current;
        let elapsed = inner.opened_at.elapsed();

        if inner.history.len() >= self.history_capacity {
            inner.history.pop_front();
        }
        inner.history.push_back((closed, elapsed));

        inner.current = GatewayStatsInterval::default();
        inner.opened_at = Instant::now();
        closed
    }

    /// Most recently closed interval, if any.
    pub fn most_recent_closed(&self) -> Option<GatewayStatsInterval> {
        self.inner
            .lock()
            .expect("gateway stats lock poisoned")
            .history
            .back()
            .map(|(interval, _)| *interval)
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}
