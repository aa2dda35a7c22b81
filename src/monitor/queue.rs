use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};

/// One file queued for download, carrying enough of its parent release's
/// context to file it away once fetched. Mirrors the 5-tuple
/// `(−suspicion, project, version, task_index, url_dict)` the original
/// pushes onto `download_priority_queue`.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub suspicion: u8,
    pub project: String,
    pub version: String,
    pub filename: String,
    pub url: String,
    pub sha256: Option<String>,
}

/// One local file queued for taint analysis, mirroring the 6-tuple pushed
/// onto `analysis_priority_queue`.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub suspicion: u8,
    pub project: String,
    pub version: String,
    pub local_path: PathBuf,
    pub filename: String,
    pub url: String,
}

struct Entry<T> {
    suspicion: u8,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.suspicion == other.suspicion && self.sequence == other.sequence
    }
}
impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by `(suspicion, -sequence)` so a `BinaryHeap` (a max-heap) pops
/// the highest-suspicion item first, and among ties pops the
/// earliest-enqueued item first (FIFO).
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.suspicion.cmp(&other.suspicion).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct QueueState<T> {
    heap: BinaryHeap<Entry<T>>,
    next_sequence: u64,
}

/// A concurrent binary heap with a blocking pop, grounded in the
/// concurrency design notes' "concurrent binary heap with a blocking pop"
/// for the download/analysis priority queues. Unbounded; backpressure is
/// implicit in the blocking `pop`.
pub struct PriorityQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        PriorityQueue {
            state: Mutex::new(QueueState { heap: BinaryHeap::new(), next_sequence: 0 }),
            not_empty: Condvar::new(),
        }
    }

    pub fn push(&self, suspicion: u8, item: T) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.heap.push(Entry { suspicion, sequence, item });
        self.not_empty.notify_one();
    }

    /// Blocks until an item is available, then returns the
    /// highest-priority one.
    pub fn pop(&self) -> T {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        loop {
            if let Some(entry) = state.heap.pop() {
                return entry.item;
            }
            state = self.not_empty.wait(state).expect("queue condvar poisoned");
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_highest_suspicion_first() {
        let q: PriorityQueue<&str> = PriorityQueue::new();
        q.push(2, "low-ish");
        q.push(9, "urgent");
        q.push(5, "medium");
        assert_eq!(q.pop(), "urgent");
        assert_eq!(q.pop(), "medium");
        assert_eq!(q.pop(), "low-ish");
    }

    #[test]
    fn breaks_ties_fifo() {
        let q: PriorityQueue<&str> = PriorityQueue::new();
        q.push(5, "first");
        q.push(5, "second");
        assert_eq!(q.pop(), "first");
        assert_eq!(q.pop(), "second");
    }
}
