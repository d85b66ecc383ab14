use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{AsPathType, AsRelationDirection, PathId, TaggedVerdict};

/// One row of the AS-path cache (§3, §4.6).
#[derive(Debug, Clone)]
pub struct PathEntry {
    pub as_path: Vec<u32>,
    pub as_type: AsPathType,
    pub direction: AsRelationDirection,
    pub aspa: TaggedVerdict,
    pub ref_count: u32,
}

/// `PathID → ASPA verdict`, shared by every update whose AS-path hashes to
/// the same id (§4.6).
pub struct PathCache {
    entries: Mutex<HashMap<PathId, PathEntry>>,
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PathCache {
    pub fn new() -> Self {
        PathCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `lookup`: the shared entry and verdict, if a path with this id has
    /// already been stored.
    pub fn lookup(&self, id: PathId) -> Option<(PathEntry, TaggedVerdict)> {
        let entries = self.entries.lock().unwrap();
        entries.get(&id).map(|e| (e.clone(), e.aspa))
    }

    /// `store`. Installs a new path entry on first reference; subsequent
    /// references to the same id just bump the reference count instead of
    /// re-validating ASPA (§4.6 deduplication).
    pub fn store(
        &self,
        id: PathId,
        defaults: TaggedVerdict,
        as_path: Vec<u32>,
        as_type: AsPathType,
        direction: AsRelationDirection,
    ) {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(id)
            .and_modify(|e| e.ref_count += 1)
            .or_insert(PathEntry {
                as_path,
                as_type,
                direction,
                aspa: defaults,
                ref_count: 1,
            });
    }

    pub fn set_verdict(&self, id: PathId, verdict: TaggedVerdict) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&id) {
            entry.aspa = verdict;
        }
    }

    /// Drops one update entry's reference; deletes the path entry once no
    /// update references it (§3 lifecycle).
    pub fn release(&self, id: PathId) {
        let mut entries = self.entries.lock().unwrap();
        let mut drop_entry = false;
        if let Some(entry) = entries.get_mut(&id) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            drop_entry = entry.ref_count == 0;
        }
        if drop_entry {
            entries.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Verdict;

    #[test]
    fn second_store_of_same_path_shares_the_verdict() {
        let cache = PathCache::new();
        let id = PathId(1);
        let default = TaggedVerdict::default_of(Verdict::Undefined);
        cache.store(id, default, vec![65001, 65002], AsPathType::Sequence, AsRelationDirection::Upstream);
        cache.set_verdict(id, TaggedVerdict::from_validator(Verdict::Valid));

        cache.store(id, default, vec![65001, 65002], AsPathType::Sequence, AsRelationDirection::Upstream);
        let (entry, verdict) = cache.lookup(id).unwrap();
        assert_eq!(entry.ref_count, 2);
        assert_eq!(verdict.verdict, Verdict::Valid);
    }

    #[test]
    fn release_to_zero_drops_the_entry() {
        let cache = PathCache::new();
        let id = PathId(1);
        let default = TaggedVerdict::default_of(Verdict::Undefined);
        cache.store(id, default, vec![65001], AsPathType::Sequence, AsRelationDirection::Unknown);
        cache.release(id);
        assert!(cache.lookup(id).is_none());
    }
}
