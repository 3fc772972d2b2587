/*
 * Per-profile ordering of cache writes. Every remote call that may end in a
 * write-through takes a ticket when it is issued; tickets increase per id.
 *
 * Updates for one id are serialized by the update lock, so the server applies
 * them in ticket order and each update's response is at least as fresh as any
 * load that overlapped it. An update's write therefore always commits. A
 * load's write commits only if no update has committed since the load was
 * issued and no newer write has committed; otherwise the response may predate
 * a write the cache already holds and is dropped.
 *
 * A slot exists only while an id has outstanding tickets or update permits,
 * so the map does not grow with every id ever seen.
 */
use super::models::ProfileId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
struct SlotState {
    issued: u64,
    committed: u64,
    // Number of update writes committed so far.
    committed_updates: u64,
    outstanding_tickets: usize,
    update_permits: usize,
    update_lock: Arc<tokio::sync::Mutex<()>>,
    // Held while a commit checks its ticket and writes; per id, so a slow write
    // for one profile does not hold up the others.
    commit_lock: Arc<Mutex<()>>,
}

impl SlotState {
    fn is_idle(&self) -> bool {
        self.outstanding_tickets == 0 && self.update_permits == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TicketKind {
    Load { committed_updates_at_issue: u64 },
    Update,
}

/*
 * A claim on a future cache write. Dropping it (after committing, or after the
 * remote call failed) releases the slot.
 */
pub struct WriteTicket<'a> {
    sequencer: &'a WriteSequencer,
    id: ProfileId,
    seq: u64,
    kind: TicketKind,
}

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        self.sequencer
            .release(&self.id, |slot| slot.outstanding_tickets -= 1);
    }
}

// Holds the per-id update lock. Dropping it unlocks and releases the slot.
pub struct UpdatePermit<'a> {
    sequencer: &'a WriteSequencer,
    id: ProfileId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UpdatePermit<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.sequencer
            .release(&self.id, |slot| slot.update_permits -= 1);
    }
}

#[derive(Default)]
pub struct WriteSequencer {
    slots: Mutex<HashMap<ProfileId, SlotState>>,
}

impl WriteSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<ProfileId, SlotState>> {
        // A poisoned lock only means another thread panicked mid-update; counters stay usable.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_slot<R>(&self, id: &ProfileId, f: impl FnOnce(&mut SlotState) -> R) -> R {
        f(self.lock_slots().entry(id.clone()).or_default())
    }

    fn release(&self, id: &ProfileId, f: impl FnOnce(&mut SlotState)) {
        let mut slots = self.lock_slots();
        let idle = match slots.get_mut(id) {
            Some(slot) => {
                f(slot);
                slot.is_idle()
            }
            None => false,
        };
        if idle {
            slots.remove(id);
            log::trace!("WriteSequencer: Released slot for '{id}'.");
        }
    }

    fn issue(&self, id: &ProfileId, kind_for: impl FnOnce(&SlotState) -> TicketKind) -> WriteTicket<'_> {
        let (seq, kind) = self.with_slot(id, |slot| {
            slot.issued += 1;
            slot.outstanding_tickets += 1;
            (slot.issued, kind_for(slot))
        });
        WriteTicket {
            sequencer: self,
            id: id.clone(),
            seq,
            kind,
        }
    }

    pub fn issue_load(&self, id: &ProfileId) -> WriteTicket<'_> {
        self.issue(id, |slot| TicketKind::Load {
            committed_updates_at_issue: slot.committed_updates,
        })
    }

    // Must be called with the id's `UpdatePermit` held.
    pub fn issue_update(&self, id: &ProfileId) -> WriteTicket<'_> {
        self.issue(id, |_| TicketKind::Update)
    }

    // Waits for the per-id update lock.
    pub async fn lock_updates(&self, id: &ProfileId) -> UpdatePermit<'_> {
        let lock = self.with_slot(id, |slot| {
            slot.update_permits += 1;
            slot.update_lock.clone()
        });
        // Created before waiting so a cancelled wait still releases the slot.
        let mut permit = UpdatePermit {
            sequencer: self,
            id: id.clone(),
            guard: None,
        };
        permit.guard = Some(lock.lock_owned().await);
        permit
    }

    /*
     * Runs `write` if `ticket` may still commit, and records it as committed.
     * The check and the write happen under the id's commit lock. Returns
     * `None` when the ticket was refused and nothing was run. A failed write
     * still counts as committed.
     *
     * `write` runs on the calling thread; with file storage that is a short
     * blocking write on a runtime worker.
     */
    pub fn commit_if_latest<R>(&self, ticket: &WriteTicket<'_>, write: impl FnOnce() -> R) -> Option<R> {
        let commit_lock = self.with_slot(&ticket.id, |slot| slot.commit_lock.clone());
        let _committing = commit_lock.lock().unwrap_or_else(|e| e.into_inner());

        let accepted = self.with_slot(&ticket.id, |slot| match ticket.kind {
            TicketKind::Update => {
                slot.committed = slot.committed.max(ticket.seq);
                slot.committed_updates += 1;
                true
            }
            TicketKind::Load {
                committed_updates_at_issue,
            } => {
                if committed_updates_at_issue != slot.committed_updates {
                    log::debug!(
                        "WriteSequencer: Dropping load for '{}' issued before a committed update.",
                        ticket.id
                    );
                    return false;
                }
                if ticket.seq <= slot.committed {
                    log::debug!(
                        "WriteSequencer: Dropping stale load for '{}' (ticket {} <= committed {}).",
                        ticket.id,
                        ticket.seq,
                        slot.committed
                    );
                    return false;
                }
                slot.committed = ticket.seq;
                true
            }
        });
        accepted.then(write)
    }

    #[cfg(test)]
    fn tracked_ids(&self) -> usize {
        self.lock_slots().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn id(value: &str) -> ProfileId {
        ProfileId::new(value).unwrap()
    }

    #[test]
    fn test_tickets_increase_per_id() {
        let sequencer = WriteSequencer::new();
        let a1 = sequencer.issue_load(&id("a"));
        let a2 = sequencer.issue_load(&id("a"));
        let b1 = sequencer.issue_load(&id("b"));

        assert!(a2.seq > a1.seq);
        assert_eq!(b1.seq, 1);
    }

    #[test]
    fn test_older_load_is_dropped_after_newer_load_commits() {
        let sequencer = WriteSequencer::new();
        let older = sequencer.issue_load(&id("a"));
        let newer = sequencer.issue_load(&id("a"));

        assert_eq!(sequencer.commit_if_latest(&newer, || "newer"), Some("newer"));
        assert_eq!(sequencer.commit_if_latest(&older, || "older"), None);
    }

    #[test]
    fn test_in_order_loads_all_apply() {
        let sequencer = WriteSequencer::new();
        let first = sequencer.issue_load(&id("a"));
        let second = sequencer.issue_load(&id("a"));

        assert_eq!(sequencer.commit_if_latest(&first, || 1), Some(1));
        assert_eq!(sequencer.commit_if_latest(&second, || 2), Some(2));
    }

    #[test]
    fn test_update_commits_over_load_issued_while_it_was_in_flight() {
        let sequencer = WriteSequencer::new();
        let update = sequencer.issue_update(&id("a"));
        let load = sequencer.issue_load(&id("a"));

        // The load is answered first, then the update.
        assert_eq!(sequencer.commit_if_latest(&load, || "load"), Some("load"));
        assert_eq!(sequencer.commit_if_latest(&update, || "update"), Some("update"));
    }

    #[test]
    fn test_load_issued_before_committed_update_is_dropped() {
        let sequencer = WriteSequencer::new();
        let load = sequencer.issue_load(&id("a"));
        let update = sequencer.issue_update(&id("a"));

        assert_eq!(sequencer.commit_if_latest(&update, || "update"), Some("update"));
        assert_eq!(sequencer.commit_if_latest(&load, || "load"), None);
    }

    #[test]
    fn test_load_survives_failed_update() {
        let sequencer = WriteSequencer::new();
        let load = sequencer.issue_load(&id("a"));
        // Issued and dropped without committing, like a failed remote write.
        drop(sequencer.issue_update(&id("a")));

        assert_eq!(sequencer.commit_if_latest(&load, || "load"), Some("load"));
    }

    #[tokio::test]
    async fn test_update_lock_serializes_per_id() {
        let sequencer = WriteSequencer::new();
        let held = sequencer.lock_updates(&id("a")).await;

        let other_id = tokio::time::timeout(Duration::from_millis(50), sequencer.lock_updates(&id("b"))).await;
        assert!(other_id.is_ok());
        let same_id = tokio::time::timeout(Duration::from_millis(50), sequencer.lock_updates(&id("a"))).await;
        assert!(same_id.is_err());

        drop(held);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), sequencer.lock_updates(&id("a")))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_slots_are_released_when_idle() {
        let sequencer = WriteSequencer::new();
        {
            let permit = sequencer.lock_updates(&id("a")).await;
            let ticket = sequencer.issue_update(&id("a"));
            let load = sequencer.issue_load(&id("b"));
            assert_eq!(sequencer.tracked_ids(), 2);
            sequencer.commit_if_latest(&ticket, || ());
            drop(load);
            assert_eq!(sequencer.tracked_ids(), 1);
            drop(ticket);
            assert_eq!(sequencer.tracked_ids(), 1);
            drop(permit);
        }
        assert_eq!(sequencer.tracked_ids(), 0);
    }

    #[test]
    fn test_slow_write_does_not_block_other_ids() {
        let sequencer = WriteSequencer::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        std::thread::scope(|scope| {
            let sequencer = &sequencer;
            scope.spawn(move || {
                let ticket = sequencer.issue_load(&id("a"));
                sequencer.commit_if_latest(&ticket, || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                });
            });

            entered_rx.recv().unwrap();
            // Both of these need the slot map while "a" is still writing.
            let ticket = sequencer.issue_load(&id("b"));
            assert_eq!(sequencer.commit_if_latest(&ticket, || "b"), Some("b"));
            release_tx.send(()).unwrap();
        });
    }
}
