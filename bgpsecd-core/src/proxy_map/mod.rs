//! External `proxyID` ⇄ internal slot table (§4.3). 256 slots, slot 0
//! reserved, guarded by a single leaf mutex per §5's locking discipline.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{CoreError, Result};
use crate::model::ClientSlot;
use crate::session::SessionHandle;

/// Matches `original_source/configuration.h`'s `MAX_PROXY_MAPPINGS`.
pub const MAX_PROXY_MAPPINGS: usize = 256;

/// One row of the proxy-client mapping table (§3).
#[derive(Debug, Clone)]
pub struct ProxyMapping {
    pub proxy_id: u32,
    pub session: Option<SessionHandle>,
    pub is_active: bool,
    pub pre_defined: bool,
    pub crashed_at: Option<Instant>,
    pub update_count: u32,
}

/// Outcome of [`ProxyMap::deactivate`], fed to the update cache so it can
/// schedule listener-set cleanup after the right grace window (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct DeactivationOutcome {
    pub grace_period: Duration,
    pub fully_removed: bool,
}

struct Inner {
    slots: Vec<Option<ProxyMapping>>,
}

pub struct ProxyMap {
    inner: Mutex<Inner>,
    default_keep_window: Duration,
}

impl ProxyMap {
    pub fn new(default_keep_window: Duration) -> Self {
        let mut slots = Vec::with_capacity(MAX_PROXY_MAPPINGS);
        slots.resize_with(MAX_PROXY_MAPPINGS, || None);
        ProxyMap {
            inner: Mutex::new(Inner { slots }),
            default_keep_window,
        }
    }

    /// `findClientID(proxyID) → slot`, 0 if none. Slot 0 never matches since
    /// it is never allocated.
    pub fn find_client_id(&self, proxy_id: u32) -> ClientSlot {
        if proxy_id == 0 {
            return 0;
        }
        let inner = self.inner.lock().unwrap();
        for slot in 1..MAX_PROXY_MAPPINGS {
            if let Some(m) = &inner.slots[slot] {
                if m.proxy_id == proxy_id {
                    return slot as ClientSlot;
                }
            }
        }
        0
    }

    /// `createClientID() → slot`, smallest free slot ≥ 1, or 0 if full.
    pub fn create_client_id(&self) -> ClientSlot {
        let inner = self.inner.lock().unwrap();
        for slot in 1..MAX_PROXY_MAPPINGS {
            if inner.slots[slot].is_none() {
                return slot as ClientSlot;
            }
        }
        0
    }

    /// `addMapping`. Idempotent when `(slot, proxy_id)` match an existing
    /// row that either has no live session (a crashed or pre-defined row
    /// accepting reconnection) or already has this exact session; a proxyID
    /// bound elsewhere, or a slot bound to a different live session, is
    /// rejected rather than silently overwriting the other proxy's binding
    /// (§4.3 tie-break rule).
    pub fn add_mapping(
        &self,
        proxy_id: u32,
        slot: ClientSlot,
        session: Option<SessionHandle>,
        activate: bool,
    ) -> Result<()> {
        if slot == 0 {
            return Err(CoreError::ReservedSlot);
        }
        let mut inner = self.inner.lock().unwrap();
        let idx = slot as usize;
        match inner.slots[idx].clone() {
            None => {
                for other in 1..MAX_PROXY_MAPPINGS {
                    if other != idx {
                        if let Some(m) = &inner.slots[other] {
                            if m.proxy_id == proxy_id {
                                return Err(CoreError::DuplicateProxyId(proxy_id));
                            }
                        }
                    }
                }
                inner.slots[idx] = Some(ProxyMapping {
                    proxy_id,
                    session,
                    is_active: activate,
                    pre_defined: !activate,
                    crashed_at: None,
                    update_count: 0,
                });
                Ok(())
            }
            Some(existing) => {
                // A row with no live session (crashed or pre-defined) accepts
                // any session on reconnect; a row with a live session only
                // re-registers idempotently for that exact same session.
                let session_matches = existing.session.is_none() || existing.session == session;
                if existing.proxy_id == proxy_id && session_matches {
                    let entry = inner.slots[idx].as_mut().unwrap();
                    entry.is_active = entry.is_active || activate;
                    entry.crashed_at = None;
                    Ok(())
                } else {
                    Err(CoreError::DuplicateProxyId(proxy_id))
                }
            }
        }
    }

    /// `setActivation`. Toggles `is_active` only, never touches `session`.
    pub fn set_activation(&self, slot: ClientSlot, value: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.slots.get_mut(slot as usize).and_then(Option::as_mut) {
            Some(m) => {
                m.is_active = value;
                Ok(())
            }
            None => Err(CoreError::UnknownSlot(slot)),
        }
    }

    /// `deactivate`. Clears the session, records a crash timestamp when
    /// applicable, and removes the row outright only when it is neither
    /// pre-defined nor crashed (crashed rows survive for the grace window so
    /// a reconnect can rebind them).
    pub fn deactivate(
        &self,
        slot: ClientSlot,
        crashed: bool,
        keep_window: Duration,
    ) -> Result<DeactivationOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let idx = slot as usize;
        let entry = inner.slots[idx]
            .as_mut()
            .ok_or(CoreError::UnknownSlot(slot))?;
        entry.session = None;
        entry.is_active = false;
        if crashed {
            entry.crashed_at = Some(Instant::now());
        }
        let pre_defined = entry.pre_defined;
        let grace_period = keep_window.max(self.default_keep_window);
        let fully_removed = !pre_defined && !crashed;
        if fully_removed {
            inner.slots[idx] = None;
        }
        Ok(DeactivationOutcome {
            grace_period,
            fully_removed,
        })
    }

    /// Snapshot of one row, for broadcast and diagnostics.
    pub fn get(&self, slot: ClientSlot) -> Option<ProxyMapping> {
        let inner = self.inner.lock().unwrap();
        inner.slots.get(slot as usize).cloned().flatten()
    }

    /// All slots currently bound to a live session, for `broadcastPacket`.
    pub fn bound_sessions(&self) -> Vec<(ClientSlot, SessionHandle)> {
        let inner = self.inner.lock().unwrap();
        inner.slots[1..]
            .iter()
            .enumerate()
            .filter_map(|(i, m)| {
                let m = m.as_ref()?;
                let handle = m.session.clone()?;
                m.is_active.then_some((i as ClientSlot + 1, handle))
            })
            .collect()
    }

    /// Reaps crashed, non-predefined mappings whose keep-window has elapsed
    /// (scenario 6). Returns the slots removed so the caller can cascade the
    /// listener-set cleanup in the update cache.
    pub fn sweep_expired(&self, now: Instant) -> Vec<ClientSlot> {
        let mut inner = self.inner.lock().unwrap();
        let mut expired = Vec::new();
        for slot in 1..MAX_PROXY_MAPPINGS {
            let keep = self.default_keep_window;
            if let Some(m) = &inner.slots[slot] {
                if !m.pre_defined {
                    if let Some(crashed_at) = m.crashed_at {
                        if now.duration_since(crashed_at) >= keep {
                            expired.push(slot as ClientSlot);
                        }
                    }
                }
            }
        }
        for slot in &expired {
            inner.slots[*slot as usize] = None;
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle() -> SessionHandle {
        let (tx, _rx) = mpsc::channel(1);
        SessionHandle::new(tx)
    }

    #[test]
    fn slot_zero_is_never_allocated() {
        let map = ProxyMap::new(Duration::from_secs(30));
        assert_eq!(map.find_client_id(0), 0);
        assert!(matches!(
            map.add_mapping(1, 0, None, false),
            Err(CoreError::ReservedSlot)
        ));
    }

    #[test]
    fn create_then_find_round_trips() {
        let map = ProxyMap::new(Duration::from_secs(30));
        let slot = map.create_client_id();
        assert_eq!(slot, 1);
        map.add_mapping(0x0A0B0C0D, slot, Some(handle()), true).unwrap();
        assert_eq!(map.find_client_id(0x0A0B0C0D), slot);
    }

    #[test]
    fn reregistration_with_identical_tuple_is_idempotent() {
        let map = ProxyMap::new(Duration::from_secs(30));
        let h = handle();
        map.add_mapping(1, 1, Some(h.clone()), true).unwrap();
        map.add_mapping(1, 1, Some(h), true).unwrap();
    }

    #[test]
    fn mismatched_proxy_for_bound_slot_is_rejected() {
        let map = ProxyMap::new(Duration::from_secs(30));
        map.add_mapping(1, 1, Some(handle()), true).unwrap();
        assert!(matches!(
            map.add_mapping(2, 1, Some(handle()), true),
            Err(CoreError::DuplicateProxyId(2))
        ));
    }

    #[test]
    fn same_proxy_different_slot_is_rejected() {
        let map = ProxyMap::new(Duration::from_secs(30));
        let h = handle();
        map.add_mapping(1, 1, Some(h.clone()), true).unwrap();
        assert!(matches!(
            map.add_mapping(1, 2, Some(h), true),
            Err(CoreError::DuplicateProxyId(1))
        ));
    }

    #[test]
    fn crash_then_reconnect_within_keep_window_rebinds_same_slot() {
        let map = ProxyMap::new(Duration::from_secs(30));
        let h = handle();
        map.add_mapping(1, 1, Some(h), true).unwrap();
        let outcome = map.deactivate(1, true, Duration::from_secs(30)).unwrap();
        assert!(!outcome.fully_removed);
        // same proxy reconnects, finds the same slot still reserved
        assert_eq!(map.find_client_id(1), 1);
        let h2 = handle();
        map.add_mapping(1, 1, Some(h2), true).unwrap();
        assert!(map.get(1).unwrap().crashed_at.is_none());
    }

    #[test]
    fn clean_disconnect_of_non_predefined_slot_is_removed_immediately() {
        let map = ProxyMap::new(Duration::from_secs(30));
        map.add_mapping(1, 1, Some(handle()), true).unwrap();
        let outcome = map.deactivate(1, false, Duration::from_secs(30)).unwrap();
        assert!(outcome.fully_removed);
        assert_eq!(map.find_client_id(1), 0);
    }

    #[test]
    fn pre_defined_slot_survives_clean_disconnect() {
        let map = ProxyMap::new(Duration::from_secs(30));
        map.add_mapping(1, 1, None, false).unwrap();
        let outcome = map.deactivate(1, false, Duration::from_secs(30)).unwrap();
        assert!(!outcome.fully_removed);
        assert!(map.get(1).is_some());
    }
}
