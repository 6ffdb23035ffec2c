use std::collections::HashMap;
use crate::communication::PendingRequest;
use crate::key::BatchKey;

/// # RequestGroup
///
/// Drain buffer mapping each [`BatchKey`] to its pending requests.
///
/// Requests keep submission order within a key, and keys are yielded in
/// the order they were first seen during the cycle. The table is owned by
/// the scheduler loop alone and is emptied by every [`drain`](Self::drain).
pub struct RequestGroup<P, O> {
    /// Position of each key inside `groups`
    index: HashMap<BatchKey, usize>,

    /// Pending requests per key, in first-seen key order
    groups: Vec<(BatchKey, Vec<PendingRequest<P, O>>)>,

    /// Requests across all keys
    pending: usize,
}

impl<P, O> Default for RequestGroup<P, O> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
            pending: 0,
        }
    }
}

impl<P, O> RequestGroup<P, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `request` behind everything already pending for `key`.
    pub fn insert(&mut self, key: BatchKey, request: PendingRequest<P, O>) {
        match self.index.get(&key) {
            Some(&position) => self.groups[position].1.push(request),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key, vec![request]));
            }
        }
        self.pending += 1;
    }

    /// Requests pending across all keys.
    pub fn len(&self) -> usize {
        self.pending
    }

    /// Whether no key has anything pending.
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Number of distinct keys with pending requests.
    pub fn key_count(&self) -> usize {
        self.groups.len()
    }

    /// Takes every group out, leaving the table empty.
    pub fn drain(&mut self) -> Vec<(BatchKey, Vec<PendingRequest<P, O>>)> {
        self.index.clear();
        self.pending = 0;
        std::mem::take(&mut self.groups)
    }
}
