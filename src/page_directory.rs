use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type Rid = u64;

/// Which half of a `PageRange` a location points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Base,
    Tail,
}

/// The physical location of one record: which `PageRange`, which group
/// within it, and which slot within the group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub range_id: usize,
    pub kind: GroupKind,
    pub group_id: usize,
    pub slot: usize,
}

impl Location {
    pub fn base(range_id: usize, group_id: usize, slot: usize) -> Self {
        Location {
            range_id,
            kind: GroupKind::Base,
            group_id,
            slot,
        }
    }

    pub fn tail(range_id: usize, group_id: usize, slot: usize) -> Self {
        Location {
            range_id,
            kind: GroupKind::Tail,
            group_id,
            slot,
        }
    }
}

/// Maps a record id (`Rid`) to its physical location. Entries are created on
/// insert/update and removed on delete; they are never rewritten in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDirectory {
    entries: HashMap<Rid, Location>,
}

impl PageDirectory {
    pub fn new() -> Self {
        PageDirectory {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, rid: Rid, location: Location) {
        self.entries.insert(rid, location);
    }

    pub fn get(&self, rid: Rid) -> Option<Location> {
        self.entries.get(&rid).copied()
    }

    pub fn remove(&mut self, rid: Rid) -> Option<Location> {
        self.entries.remove(&rid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_entries(entries: HashMap<Rid, Location>) -> Self {
        PageDirectory { entries }
    }

    pub fn entries(&self) -> &HashMap<Rid, Location> {
        &self.entries
    }
}
