use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::Included;

use serde::{Deserialize, Serialize};

use crate::page_directory::Rid;

/// Primary-key index: `key -> base Rid`. Authoritative for existence: a key
/// is live if and only if it has an entry here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimaryIndex {
    entries: BTreeMap<i64, Rid>,
}

impl PrimaryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: i64) -> Option<Rid> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: i64, rid: Rid) {
        self.entries.insert(key, rid);
    }

    pub fn remove(&mut self, key: i64) -> Option<Rid> {
        self.entries.remove(&key)
    }

    pub fn contains(&self, key: i64) -> bool {
        self.entries.contains_key(&key)
    }

    /// Keys (and their base Rids) in `[lo, hi]`, in ascending key order.
    pub fn range(&self, lo: i64, hi: i64) -> impl Iterator<Item = (i64, Rid)> + '_ {
        self.entries
            .range((Included(lo), Included(hi)))
            .map(|(&k, &rid)| (k, rid))
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, Rid)> + '_ {
        self.entries.iter().map(|(&k, &rid)| (k, rid))
    }

    pub fn from_entries(entries: BTreeMap<i64, Rid>) -> Self {
        PrimaryIndex { entries }
    }

    pub fn entries(&self) -> &BTreeMap<i64, Rid> {
        &self.entries
    }
}

/// On-demand secondary index over one non-key column: `value -> {base Rid}`.
pub type SecondaryIndex = BTreeMap<i64, BTreeSet<Rid>>;

/// Holds an optional `SecondaryIndex` per user column (the primary-key
/// column's slot is always `None` here; lookups on it go through
/// `PrimaryIndex` instead). Construction is optional and on-demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indexer {
    secondary: Vec<Option<SecondaryIndex>>,
}

impl Indexer {
    pub fn new(num_columns: usize) -> Self {
        Indexer {
            secondary: vec![None; num_columns],
        }
    }

    pub fn is_built(&self, column: usize) -> bool {
        self.secondary.get(column).map_or(false, Option::is_some)
    }

    /// Build (or rebuild) the secondary index for `column` from a full scan
    /// of `(value, base_rid)` pairs.
    pub fn build(&mut self, column: usize, entries: impl Iterator<Item = (i64, Rid)>) {
        let mut index: SecondaryIndex = BTreeMap::new();
        for (value, rid) in entries {
            index.entry(value).or_default().insert(rid);
        }
        self.secondary[column] = Some(index);
    }

    pub fn lookup(&self, column: usize, value: i64) -> Option<&BTreeSet<Rid>> {
        self.secondary.get(column)?.as_ref()?.get(&value)
    }

    pub fn range(&self, column: usize, lo: i64, hi: i64) -> Vec<Rid> {
        match self.secondary.get(column).and_then(Option::as_ref) {
            Some(index) => index
                .range((Included(lo), Included(hi)))
                .flat_map(|(_, rids)| rids.iter().copied())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn insert(&mut self, column: usize, value: i64, rid: Rid) {
        if let Some(index) = self.secondary[column].as_mut() {
            index.entry(value).or_default().insert(rid);
        }
    }

    pub fn remove(&mut self, column: usize, value: i64, rid: Rid) {
        if let Some(index) = self.secondary[column].as_mut() {
            if let Some(set) = index.get_mut(&value) {
                set.remove(&rid);
                if set.is_empty() {
                    index.remove(&value);
                }
            }
        }
    }

    pub fn update(&mut self, column: usize, old_value: i64, new_value: i64, rid: Rid) {
        if old_value == new_value {
            return;
        }
        self.remove(column, old_value, rid);
        self.insert(column, new_value, rid);
    }

    pub fn from_secondary(secondary: Vec<Option<SecondaryIndex>>) -> Self {
        Indexer { secondary }
    }

    pub fn secondary(&self) -> &[Option<SecondaryIndex>] {
        &self.secondary
    }
}
