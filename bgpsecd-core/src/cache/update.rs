use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::model::{ClientSlot, IpPrefix, PathId, SrxResult, UpdateId};

/// One row of the update cache (§3, §4.5).
#[derive(Debug, Clone)]
pub struct UpdateEntry {
    pub origin_as: u32,
    pub prefix: IpPrefix,
    pub bgpsec: Option<Bytes>,
    pub path_id: PathId,
    pub result: SrxResult,
    pub listeners: HashSet<ClientSlot>,
    pub last_touch: Instant,
    pub grace_deadline: Option<Instant>,
}

impl UpdateEntry {
    fn matches(&self, prefix: &IpPrefix, origin_as: u32, bgpsec: Option<&[u8]>) -> bool {
        self.origin_as == origin_as && &self.prefix == prefix && self.bgpsec.as_deref() == bgpsec
    }
}

/// `UpdateID → verdicts + listeners`, guarded by a single leaf mutex (§4.5,
/// §5). Never held across an `.await` and never held while acquiring the
/// proxy-map lock.
pub struct UpdateCache {
    entries: Mutex<HashMap<UpdateId, UpdateEntry>>,
}

impl Default for UpdateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateCache {
    pub fn new() -> Self {
        UpdateCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `detectCollision`: true when an entry already lives at `id` with a
    /// different `(prefix, origin, bgpsec)` key.
    pub fn detect_collision(
        &self,
        id: UpdateId,
        prefix: &IpPrefix,
        origin_as: u32,
        bgpsec: Option<&[u8]>,
    ) -> bool {
        let entries = self.entries.lock().unwrap();
        match entries.get(&id) {
            Some(entry) => !entry.matches(prefix, origin_as, bgpsec),
            None => false,
        }
    }

    /// Walks the fingerprint forward by one until landing on a free slot or
    /// a true match, logging the probe (§4.5 collision policy).
    pub fn find_storage_id(
        &self,
        initial: UpdateId,
        prefix: &IpPrefix,
        origin_as: u32,
        bgpsec: Option<&[u8]>,
    ) -> UpdateId {
        let mut candidate = initial;
        while self.detect_collision(candidate, prefix, origin_as, bgpsec) {
            let next = candidate.next();
            debug!(original = ?initial, from = ?candidate, to = ?next, "updateid collision, probing next id");
            candidate = next;
        }
        candidate
    }

    /// `storeUpdate`. `id` must already be collision-free (via
    /// `find_storage_id`); re-storing at an id whose entry already matches
    /// the same key is treated as the registering-listener case, not an
    /// error.
    #[allow(clippy::too_many_arguments)]
    pub fn store_update(
        &self,
        id: UpdateId,
        listener: ClientSlot,
        prefix: IpPrefix,
        origin_as: u32,
        defaults: SrxResult,
        bgpsec: Option<Bytes>,
        path_id: PathId,
    ) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&id) {
            Some(existing) if existing.matches(&prefix, origin_as, bgpsec.as_deref()) => {
                existing.listeners.insert(listener);
                existing.last_touch = Instant::now();
                existing.grace_deadline = None;
                true
            }
            Some(_) => false,
            None => {
                let mut listeners = HashSet::new();
                listeners.insert(listener);
                entries.insert(
                    id,
                    UpdateEntry {
                        origin_as,
                        prefix,
                        bgpsec,
                        path_id,
                        result: defaults,
                        listeners,
                        last_touch: Instant::now(),
                        grace_deadline: None,
                    },
                );
                true
            }
        }
    }

    /// `getResult`. Registers `listener` if the entry is found.
    pub fn get_result(&self, id: UpdateId, listener: ClientSlot) -> Option<(SrxResult, PathId)> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&id)?;
        entry.listeners.insert(listener);
        entry.grace_deadline = None;
        entry.last_touch = Instant::now();
        Some((entry.result, entry.path_id))
    }

    /// `modifyResultWithAspa`. Late-patches the ASPA verdict once the path
    /// cache resolves it. Returns the full result for the diverges-from
    /// comparison the caller needs to decide whether to notify listeners.
    pub fn modify_result_with_aspa(
        &self,
        id: UpdateId,
        aspa: crate::model::TaggedVerdict,
    ) -> Option<SrxResult> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&id)?;
        entry.result.aspa = aspa;
        Some(entry.result)
    }

    /// Overwrites the full verdict triple (e.g. after an origin/BGPsec
    /// validation run) and returns the prior value for divergence checks.
    pub fn update_result(&self, id: UpdateId, result: SrxResult) -> Option<SrxResult> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&id)?;
        let previous = entry.result;
        entry.result = result;
        Some(previous)
    }

    pub fn listeners(&self, id: UpdateId) -> HashSet<ClientSlot> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&id)
            .map(|e| e.listeners.clone())
            .unwrap_or_default()
    }

    pub fn path_id_of(&self, id: UpdateId) -> Option<PathId> {
        let entries = self.entries.lock().unwrap();
        entries.get(&id).map(|e| e.path_id)
    }

    /// Removes a single listener from one update (`DELETE_UPDATE`), as
    /// opposed to [`Self::unregister_client_id`] which removes a slot from
    /// every update on full disconnect.
    pub fn remove_listener(&self, id: UpdateId, slot: ClientSlot, keep_window: Duration) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&id) {
            if entry.listeners.remove(&slot) && entry.listeners.is_empty() {
                entry.grace_deadline = Some(Instant::now() + keep_window);
            }
        }
    }

    /// Attaches a freshly produced BGPsec attribute to an update (`SIGN`).
    pub fn set_bgpsec(&self, id: UpdateId, bgpsec: Bytes) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.bgpsec = Some(bgpsec);
                true
            }
            None => false,
        }
    }

    /// `unregisterClientID`. Entries that lose their last listener enter
    /// grace rather than being deleted immediately.
    pub fn unregister_client_id(&self, slot: ClientSlot, keep_window: Duration) {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        for entry in entries.values_mut() {
            if entry.listeners.remove(&slot) && entry.listeners.is_empty() {
                entry.grace_deadline = Some(now + keep_window);
            }
        }
    }

    /// Drops entries whose grace window elapsed while still listener-less
    /// (§3 lifecycle).
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| {
            !entry.listeners.is_empty()
                || entry
                    .grace_deadline
                    .map(|deadline| now < deadline)
                    .unwrap_or(true)
        });
        before - entries.len()
    }

    pub fn contains(&self, id: UpdateId) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    /// Full snapshot of one entry, for the dispatcher to read the fields a
    /// validator needs without holding the cache lock across the call.
    pub fn snapshot(&self, id: UpdateId) -> Option<UpdateEntry> {
        self.entries.lock().unwrap().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaggedVerdict, Verdict};
    use std::net::Ipv4Addr;

    fn notfound_result() -> SrxResult {
        SrxResult {
            roa: TaggedVerdict::default_of(Verdict::NotFound),
            bgpsec: TaggedVerdict::default_of(Verdict::Undefined),
            aspa: TaggedVerdict::default_of(Verdict::Undefined),
        }
    }

    #[test]
    fn store_then_get_round_trips() {
        let cache = UpdateCache::new();
        let prefix = IpPrefix::v4(Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
        let id = UpdateId(1);
        assert!(cache.store_update(id, 1, prefix, 65001, notfound_result(), None, PathId(7)));
        let (result, path_id) = cache.get_result(id, 1).unwrap();
        assert_eq!(result, notfound_result());
        assert_eq!(path_id, PathId(7));
    }

    #[test]
    fn collision_is_resolved_by_probing_forward() {
        let cache = UpdateCache::new();
        let prefix_a = IpPrefix::v4(Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
        let prefix_b = IpPrefix::v4(Ipv4Addr::new(198, 51, 100, 0), 24).unwrap();
        let id = UpdateId(42);
        cache.store_update(id, 1, prefix_a, 65001, notfound_result(), None, PathId(1));

        let resolved = cache.find_storage_id(id, &prefix_b, 65002, None);
        assert_eq!(resolved, id.next());
        assert!(cache.store_update(resolved, 2, prefix_b, 65002, notfound_result(), None, PathId(2)));
        assert!(cache.contains(id));
        assert!(cache.contains(resolved));
    }

    #[test]
    fn unregister_puts_orphaned_entry_into_grace() {
        let cache = UpdateCache::new();
        let prefix = IpPrefix::v4(Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
        let id = UpdateId(1);
        cache.store_update(id, 1, prefix, 65001, notfound_result(), None, PathId(1));
        cache.unregister_client_id(1, Duration::from_secs(0));
        assert_eq!(cache.sweep_expired(Instant::now() + Duration::from_millis(1)), 1);
        assert!(!cache.contains(id));
    }
}
