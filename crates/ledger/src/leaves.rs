//! Leaf set and lowest-dependency bookkeeping.
//!
//! A *leaf* is a command that has no outstanding dependencies of its own.
//! The scanner uses the two reverse indexes kept here to shortcut repeated
//! traversals and to garbage-collect committed digests out of every
//! `low_cmd` set that mentions them.

use phalanx_types::Digest;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct LeafSet {
    leaves: BTreeSet<Digest>,

    /// low → owners whose `low_cmd` has contained `low`.
    groups: HashMap<Digest, BTreeSet<Digest>>,

    /// owner → lows its `low_cmd` has contained.
    traces: HashMap<Digest, BTreeSet<Digest>>,
}

impl LeafSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, digest: Digest) {
        self.leaves.insert(digest);
    }

    pub fn cut(&mut self, digest: &Digest) {
        self.leaves.remove(digest);
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.leaves.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Record that `owner` has `low` among its lowest dependencies.
    pub fn link(&mut self, owner: Digest, low: Digest) {
        self.groups.entry(low).or_default().insert(owner);
        self.traces.entry(owner).or_default().insert(low);
    }

    /// Whether `owner` has ever had `low` among its lowest dependencies.
    pub fn trace_leaf(&self, owner: &Digest, low: &Digest) -> bool {
        self.traces
            .get(owner)
            .is_some_and(|lows| lows.contains(low))
    }

    /// Owners that have referenced `low`.
    pub fn leaf_group(&self, low: &Digest) -> Option<&BTreeSet<Digest>> {
        self.groups.get(low)
    }

    /// Drop every trace of a committed digest.
    ///
    /// Returns the owners that referenced it so the caller can remove it
    /// from their `low_cmd` sets.
    pub fn release(&mut self, digest: &Digest) -> BTreeSet<Digest> {
        self.leaves.remove(digest);

        let owners = self.groups.remove(digest).unwrap_or_default();
        for owner in &owners {
            if let Some(lows) = self.traces.get_mut(owner) {
                lows.remove(digest);
                if lows.is_empty() {
                    self.traces.remove(owner);
                }
            }
        }

        if let Some(lows) = self.traces.remove(digest) {
            for low in lows {
                if let Some(group) = self.groups.get_mut(&low) {
                    group.remove(digest);
                    if group.is_empty() {
                        self.groups.remove(&low);
                    }
                }
            }
        }

        owners
    }
}
