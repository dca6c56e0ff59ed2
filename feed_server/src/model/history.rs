//! Bounded per-symbol tick retention.
//!
//! The hub keeps the most recent ticks for every symbol it has seen in a
//! fixed-capacity FIFO. Overflow evicts exactly the oldest entry. The buffer
//! is owned by the hub thread alone; readers only ever receive cloned
//! snapshots, so ordering within a symbol is always the arrival order.

use std::collections::{HashMap, VecDeque};

use feed_common::Tick;

/// Ticks retained per symbol.
pub const HISTORY_BUFFER_CAPACITY: usize = 50;

/// Per-symbol bounded FIFO of recent ticks.
#[derive(Debug)]
pub struct HistoryBuffer {
    buffers: HashMap<String, VecDeque<Tick>>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create a buffer retaining up to `capacity` ticks per symbol.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            capacity,
        }
    }

    /// Create a buffer with the default capacity.
    pub fn with_default_capacity() -> Self {
        Self::new(HISTORY_BUFFER_CAPACITY)
    }

    /// Append a tick to its symbol's window, evicting the oldest on overflow.
    pub fn push(&mut self, tick: Tick) {
        let buffer = self
            .buffers
            .entry(tick.symbol.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(tick);
    }

    /// Snapshot of the retained ticks for `symbol`, oldest first.
    ///
    /// Unseen symbols yield an empty series; there is no on-demand backfill.
    pub fn series(&self, symbol: &str) -> Vec<Tick> {
        self.buffers
            .get(symbol)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The most recent tick per symbol, sorted by symbol for stable output.
    pub fn latest_per_symbol(&self) -> Vec<Tick> {
        let mut latest: Vec<Tick> = self
            .buffers
            .values()
            .filter_map(|buffer| buffer.back().cloned())
            .collect();
        latest.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        latest
    }

    /// Number of symbols with at least one retained tick.
    pub fn symbol_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of retained ticks for `symbol`.
    pub fn len_for(&self, symbol: &str) -> usize {
        self.buffers.get(symbol).map(VecDeque::len).unwrap_or(0)
    }
}
