//! Per-submission-key admission control.
//!
//! Committed receipts are kept for replay up to a fixed capacity; the oldest
//! are evicted first. In-flight and quarantined keys are never evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use stockledger_core::SubmissionKey;

use crate::config::DEFAULT_RECEIPT_CACHE_CAPACITY;
use crate::error::{SagaStep, SubmissionError};
use crate::store::StoreError;

use super::PostingReceipt;

#[derive(Debug, Clone)]
enum Slot {
    InFlight,
    Committed(PostingReceipt),
    /// Failed with writes left behind; never admitted again.
    Quarantined,
}

#[derive(Debug)]
pub enum Admission {
    Fresh,
    Committed(PostingReceipt),
}

#[derive(Debug, Default)]
struct Slots {
    by_key: HashMap<SubmissionKey, Slot>,
    /// Committed keys, oldest first.
    committed: VecDeque<SubmissionKey>,
}

#[derive(Debug)]
pub struct IdempotencyGuard {
    slots: Mutex<Slots>,
    capacity: usize,
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECEIPT_CACHE_CAPACITY)
    }
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` committed receipts.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            capacity,
        }
    }

    /// Claim `key` for a new attempt, or hand back the committed receipt.
    pub fn begin(&self, key: SubmissionKey) -> Result<Admission, SubmissionError> {
        let mut slots = self.lock()?;
        match slots.by_key.get(&key) {
            None => {
                slots.by_key.insert(key, Slot::InFlight);
                Ok(Admission::Fresh)
            }
            Some(Slot::Committed(receipt)) => Ok(Admission::Committed(receipt.clone())),
            Some(Slot::InFlight) | Some(Slot::Quarantined) => {
                Err(SubmissionError::DuplicateSubmission(key))
            }
        }
    }

    pub fn complete(&self, key: SubmissionKey, receipt: PostingReceipt) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        if !matches!(slots.by_key.insert(key, Slot::Committed(receipt)), Some(Slot::Committed(_))) {
            slots.committed.push_back(key);
        }
        while slots.committed.len() > self.capacity {
            if let Some(oldest) = slots.committed.pop_front() {
                slots.by_key.remove(&oldest);
            }
        }
    }

    /// Free `key` after a clean failure.
    pub fn release(&self, key: SubmissionKey) {
        if let Ok(mut slots) = self.slots.lock() {
            if matches!(slots.by_key.get(&key), Some(Slot::InFlight)) {
                slots.by_key.remove(&key);
            }
        }
    }

    pub fn quarantine(&self, key: SubmissionKey) {
        if let Ok(mut slots) = self.slots.lock() {
            if matches!(slots.by_key.insert(key, Slot::Quarantined), Some(Slot::Committed(_))) {
                slots.committed.retain(|k| *k != key);
            }
        }
    }

    /// Number of committed receipts currently cached.
    pub fn cached_receipts(&self) -> usize {
        self.slots.lock().map(|s| s.committed.len()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slots>, SubmissionError> {
        self.slots.lock().map_err(|_| {
            SubmissionError::persistence(
                SagaStep::Preflight,
                StoreError::Backend("idempotency guard lock poisoned".to_string()),
            )
        })
    }
}
