use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// In-memory worker state: the in-flight guard, the retry counters, and the
/// mint total. Single-process memory, not authoritative; the monitor's
/// ledger is.
pub struct WorkerState {
    started_at: Instant,
    in_flight: Mutex<HashSet<String>>,
    attempts: Mutex<HashMap<String, u32>>,
    total_mints: AtomicU64,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            in_flight: Mutex::new(HashSet::new()),
            attempts: Mutex::new(HashMap::new()),
            total_mints: AtomicU64::new(0),
        }
    }

    /// Claims the txid for execution. Returns false if a handler already has
    /// it; at most one subprocess may run per txid.
    pub fn begin(&self, txid: &str) -> bool {
        self.in_flight.lock().unwrap().insert(txid.to_string())
    }

    /// Releases the txid. Called on every executor exit path.
    pub fn finish(&self, txid: &str) {
        self.in_flight.lock().unwrap().remove(txid);
    }

    pub fn is_in_flight(&self, txid: &str) -> bool {
        self.in_flight.lock().unwrap().contains(txid)
    }

    pub fn active_operations(&self) -> Vec<String> {
        let mut ops: Vec<String> = self.in_flight.lock().unwrap().iter().cloned().collect();
        ops.sort();
        ops
    }

    pub fn attempts_for(&self, txid: &str) -> u32 {
        self.attempts.lock().unwrap().get(txid).copied().unwrap_or(0)
    }

    /// Increments the attempt counter and returns the new value.
    pub fn record_failure(&self, txid: &str) -> u32 {
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(txid.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Pins the counter at the retry ceiling so the txid is never executed.
    pub fn poison(&self, txid: &str, max_retries: u32) {
        self.attempts.lock().unwrap().insert(txid.to_string(), max_retries);
    }

    /// Forgets the counter after a confirmed mint.
    pub fn clear_attempts(&self, txid: &str) {
        self.attempts.lock().unwrap().remove(txid);
    }

    pub fn failed_attempts(&self) -> Vec<(String, u32)> {
        let mut entries: Vec<(String, u32)> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(txid, attempts)| (txid.clone(), *attempts))
            .collect();
        entries.sort();
        entries
    }

    pub fn record_mint(&self) {
        self.total_mints.fetch_add(1, Ordering::SeqCst);
    }

    pub fn seed_total_mints(&self, count: u64) {
        self.total_mints.store(count, Ordering::SeqCst);
    }

    pub fn total_mints(&self) -> u64 {
        self.total_mints.load(Ordering::SeqCst)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
