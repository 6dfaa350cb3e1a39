use crate::agenda::{sample_agenda, AgendaItem, ItemState, MS_PER_MINUTE};
use crate::store::{SessionPayload, SessionStore, StoreError};
use crate::util::round_to_tenth_minutes;
use log::{info, warn};

/// Overall meeting phase, derived from the item list and running flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingPhase {
    NotStarted,
    Running,
    Paused,
    AllComplete,
}

/// The in-progress meeting: the agenda item list and the global running
/// flag, owned as a single aggregate.
///
/// Every external collaborator goes through the transition methods below;
/// each transition is a pure no-op when its preconditions do not hold, and
/// every mutation is mirrored synchronously to the session store.
/// Transitions take `now_ms` explicitly so the time math stays testable
/// without a live clock.
#[derive(Debug)]
pub struct MeetingSession {
    items: Vec<AgendaItem>,
    is_running: bool,
    store: Option<Box<dyn SessionStore>>,
}

impl MeetingSession {
    pub fn new(items: Vec<AgendaItem>, store: Option<Box<dyn SessionStore>>) -> Self {
        Self {
            items,
            is_running: false,
            store,
        }
    }

    /// Store-less session, used by tests and headless tooling.
    pub fn in_memory(items: Vec<AgendaItem>) -> Self {
        Self::new(items, None)
    }

    /// Reconstruct the session from durable storage, crediting the time
    /// that passed while the process was unloaded to whichever item was
    /// running at the last save. Missing or unparseable payloads fall back
    /// to the sample agenda.
    pub fn load(store: Box<dyn SessionStore>, now_ms: i64) -> Self {
        Self::load_or_seed(store, now_ms, sample_agenda())
    }

    /// As [`MeetingSession::load`], but with an explicit fallback agenda
    /// for when nothing usable is stored.
    pub fn load_or_seed(store: Box<dyn SessionStore>, now_ms: i64, seed: Vec<AgendaItem>) -> Self {
        match store.load_session() {
            Ok(Some(payload)) => Self::from_payload(payload, now_ms, Some(store)),
            Ok(None) => Self::new(seed, Some(store)),
            Err(err) => {
                warn!("failed to restore session, seeding fresh agenda: {err}");
                Self::new(seed, Some(store))
            }
        }
    }

    /// Replay a persisted payload at `now_ms`: every active item gains the
    /// interval since its saved start time and is re-based to now.
    pub fn from_payload(
        payload: SessionPayload,
        now_ms: i64,
        store: Option<Box<dyn SessionStore>>,
    ) -> Self {
        let mut items = payload.agenda_items;
        for item in &mut items {
            if let ItemState::Active { start_time_ms } = item.state {
                item.elapsed_ms += now_ms - start_time_ms;
                item.state = ItemState::Active {
                    start_time_ms: now_ms,
                };
            }
        }
        Self {
            items,
            is_running: payload.is_running,
            store,
        }
    }

    pub fn items(&self) -> &[AgendaItem] {
        &self.items
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn active_index(&self) -> Option<usize> {
        self.items.iter().position(|i| i.is_active())
    }

    pub fn is_all_complete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.is_completed())
    }

    pub fn has_completed_items(&self) -> bool {
        self.items.iter().any(|i| i.is_completed())
    }

    pub fn completed_items(&self) -> Vec<AgendaItem> {
        self.items
            .iter()
            .filter(|i| i.is_completed())
            .cloned()
            .collect()
    }

    pub fn phase(&self) -> MeetingPhase {
        if self.is_all_complete() {
            MeetingPhase::AllComplete
        } else if self.is_running {
            MeetingPhase::Running
        } else if self.items.iter().any(|i| !i.is_untouched()) {
            MeetingPhase::Paused
        } else {
            MeetingPhase::NotStarted
        }
    }

    /// Begin (or resume) the meeting: the first item without a committed
    /// actual becomes active. No-op when already running, the list is
    /// empty, or everything is complete.
    pub fn start(&mut self, now_ms: i64) {
        if self.is_running || self.items.is_empty() {
            return;
        }
        let Some(idx) = self.items.iter().position(|i| !i.is_completed()) else {
            return;
        };
        self.items[idx].state = ItemState::Active {
            start_time_ms: now_ms,
        };
        self.is_running = true;
        self.persist(now_ms);
    }

    /// Freeze the meeting: bank the active item's open interval and drop it
    /// back to pending. Clears the active marker on every item, enforcing
    /// the at-most-one-active invariant.
    pub fn pause(&mut self, now_ms: i64) {
        self.is_running = false;
        for item in &mut self.items {
            if let ItemState::Active { start_time_ms } = item.state {
                item.elapsed_ms += now_ms - start_time_ms;
                item.state = ItemState::Pending;
            }
        }
        self.persist(now_ms);
    }

    /// Complete the active item, committing its actual minutes at one
    /// decimal, and hand activation to the next item in list order while
    /// the meeting is running. No-op without an active item.
    pub fn advance(&mut self, now_ms: i64) {
        let Some(idx) = self.active_index() else {
            return;
        };
        {
            let item = &mut self.items[idx];
            if let ItemState::Active { start_time_ms } = item.state {
                item.elapsed_ms += now_ms - start_time_ms;
            }
            item.state = ItemState::Completed {
                actual_minutes: round_to_tenth_minutes(item.elapsed_ms),
            };
        }
        if self.is_running {
            if let Some(next) = self.items.get_mut(idx + 1) {
                next.state = ItemState::Active {
                    start_time_ms: now_ms,
                };
            }
        }
        self.persist(now_ms);
    }

    /// Step activation back one item. The current active item banks its
    /// open interval and returns to pending; the prior item has its
    /// committed actual restored into banked time and starts accruing
    /// again. With no active item, the most recently completed item is
    /// reactivated and the meeting resumes running.
    pub fn previous(&mut self, now_ms: i64) {
        if let Some(idx) = self.active_index() {
            if idx == 0 {
                return;
            }
            let item = &mut self.items[idx];
            if let ItemState::Active { start_time_ms } = item.state {
                item.elapsed_ms += now_ms - start_time_ms;
            }
            item.state = ItemState::Pending;
            self.reactivate(idx - 1, now_ms);
        } else {
            let Some(idx) = self.items.iter().rposition(|i| i.is_completed()) else {
                return;
            };
            self.reactivate(idx, now_ms);
        }
        self.is_running = true;
        self.persist(now_ms);
    }

    fn reactivate(&mut self, idx: usize, now_ms: i64) {
        let item = &mut self.items[idx];
        if let ItemState::Completed { actual_minutes } = item.state {
            item.elapsed_ms = (actual_minutes * MS_PER_MINUTE).round() as i64;
        }
        item.state = ItemState::Active {
            start_time_ms: now_ms,
        };
    }

    /// Return every item to untouched pending and stop the meeting.
    pub fn reset(&mut self, now_ms: i64) {
        for item in &mut self.items {
            item.state = ItemState::Pending;
            item.elapsed_ms = 0;
        }
        self.is_running = false;
        self.persist(now_ms);
    }

    /// Append a pending item. Allowed at any time, including mid-meeting.
    pub fn add_item(&mut self, name: impl Into<String>, estimated_minutes: f64, now_ms: i64) -> String {
        let item = AgendaItem::new(name, estimated_minutes);
        let id = item.id.clone();
        self.items.push(item);
        self.persist(now_ms);
        id
    }

    /// Rename or re-estimate an item in any state. Timing fields are never
    /// touched here.
    pub fn edit_item(&mut self, id: &str, name: impl Into<String>, estimated_minutes: f64, now_ms: i64) {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return;
        };
        item.name = name.into();
        item.estimated_minutes = estimated_minutes;
        self.persist(now_ms);
    }

    /// Remove an item, permitted only while it is untouched pending. An
    /// item that has accrued any time is part of the meeting record and
    /// must not silently disappear.
    pub fn delete_item(&mut self, id: &str, now_ms: i64) {
        let Some(idx) = self.items.iter().position(|i| i.id == id) else {
            return;
        };
        if !self.items[idx].is_untouched() {
            return;
        }
        self.items.remove(idx);
        self.persist(now_ms);
    }

    /// Move a non-active item to a new position. Timing fields move with
    /// the item unchanged.
    pub fn reorder_item(&mut self, from: usize, to: usize, now_ms: i64) {
        if from >= self.items.len() || to >= self.items.len() || from == to {
            return;
        }
        if self.items[from].is_active() {
            return;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.persist(now_ms);
    }

    /// Swap the agenda for the fresh seed list and drop the durable
    /// session record. Used after a meeting is archived; the session is
    /// back to the state a cold start without stored data produces.
    pub fn clear_after_archive(&mut self) {
        self.items = sample_agenda();
        self.is_running = false;
        if let Some(store) = &self.store {
            if let Err(err) = store.clear_session() {
                warn!("failed to clear session record: {err}");
            } else {
                info!("session record cleared after archive");
            }
        }
    }

    /// Bank the active item's open interval and re-base its start time,
    /// without touching the running flag. Visibility hooks use this so
    /// backgrounded wall time is credited exactly once.
    pub(crate) fn bank_and_rebase_active(&mut self, now_ms: i64) {
        for item in &mut self.items {
            if let ItemState::Active { start_time_ms } = item.state {
                item.elapsed_ms += now_ms - start_time_ms;
                item.state = ItemState::Active {
                    start_time_ms: now_ms,
                };
            }
        }
    }

    /// Re-base every active item's start time to `now_ms` without banking.
    pub(crate) fn rebase_active(&mut self, now_ms: i64) {
        for item in &mut self.items {
            if let ItemState::Active { .. } = item.state {
                item.state = ItemState::Active {
                    start_time_ms: now_ms,
                };
            }
        }
    }

    pub(crate) fn persist(&mut self, now_ms: i64) {
        let Some(store) = &self.store else {
            return;
        };
        let payload = SessionPayload {
            agenda_items: self.items.clone(),
            is_running: self.is_running,
            saved_at: now_ms,
        };
        if let Err(err) = store.save_session(&payload) {
            log_store_failure(&err);
        }
    }
}

fn log_store_failure(err: &StoreError) {
    warn!("session save failed, continuing without durability: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::current_elapsed_ms;
    use assert_matches::assert_matches;

    fn items(n: usize) -> Vec<AgendaItem> {
        (0..n)
            .map(|i| AgendaItem::new(format!("item {i}"), 5.0))
            .collect()
    }

    fn at_most_one_active(session: &MeetingSession) -> bool {
        session.items().iter().filter(|i| i.is_active()).count() <= 1
    }

    #[test]
    fn test_start_activates_first_pending() {
        let mut s = MeetingSession::in_memory(items(3));
        s.start(1_000);

        assert!(s.is_running());
        assert_eq!(s.active_index(), Some(0));
        assert_eq!(s.items()[0].start_time_ms(), Some(1_000));
        assert!(at_most_one_active(&s));
    }

    #[test]
    fn test_start_empty_list_is_noop() {
        let mut s = MeetingSession::in_memory(vec![]);
        s.start(1_000);
        assert!(!s.is_running());
        assert!(s.items().is_empty());
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(1_000);
        s.advance(2_000);
        s.start(3_000);

        // the second item stays active with its original start
        assert_eq!(s.active_index(), Some(1));
        assert_eq!(s.items()[1].start_time_ms(), Some(2_000));
    }

    #[test]
    fn test_start_all_complete_is_noop() {
        let mut s = MeetingSession::in_memory(items(1));
        s.start(0);
        s.advance(60_000);
        assert!(s.is_all_complete());

        s.pause(60_000);
        s.start(70_000);
        assert!(!s.is_running());
        assert_eq!(s.active_index(), None);
    }

    #[test]
    fn test_pause_banks_and_demotes() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(1_000);
        s.pause(31_000);

        assert!(!s.is_running());
        assert_eq!(s.active_index(), None);
        assert_eq!(s.items()[0].elapsed_ms, 30_000);
        assert_matches!(s.items()[0].state, ItemState::Pending);
    }

    #[test]
    fn test_pause_then_start_preserves_elapsed() {
        let mut s = MeetingSession::in_memory(items(1));
        s.start(0);
        s.pause(10_000);
        s.start(50_000);

        // banked 10s survives the gap; the open interval restarts at 50s
        assert_eq!(current_elapsed_ms(&s.items()[0], 55_000), 15_000);
    }

    #[test]
    fn test_advance_commits_rounded_actual() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        // 125000ms = 2.0833 min, committed as 2.1
        s.advance(125_000);

        assert_eq!(s.items()[0].actual_minutes(), Some(2.1));
        assert!(!s.items()[0].is_active());
        assert_eq!(s.active_index(), Some(1));
        assert_eq!(s.items()[1].start_time_ms(), Some(125_000));
    }

    #[test]
    fn test_advance_banks_into_elapsed() {
        let mut s = MeetingSession::in_memory(items(1));
        s.start(0);
        s.advance(125_000);
        assert_eq!(s.items()[0].elapsed_ms, 125_000);
    }

    #[test]
    fn test_advance_past_last_item_reaches_all_complete() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        s.advance(60_000);
        s.advance(120_000);

        assert_eq!(s.active_index(), None);
        assert!(s.is_all_complete());
        assert_eq!(s.phase(), MeetingPhase::AllComplete);
    }

    #[test]
    fn test_advance_without_active_is_noop() {
        let mut s = MeetingSession::in_memory(items(2));
        s.advance(1_000);
        assert!(s.items().iter().all(|i| i.is_untouched()));
    }

    #[test]
    fn test_advance_while_paused_does_not_activate_next() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        // paused sessions have no active item, so advance is inert
        s.pause(30_000);
        s.advance(40_000);
        assert_eq!(s.active_index(), None);
        assert!(!s.items()[0].is_completed());
    }

    #[test]
    fn test_previous_restores_committed_actual() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        s.advance(120_000); // item 0 committed at 2.0 min
        s.previous(150_000);

        assert_eq!(s.active_index(), Some(0));
        assert_eq!(s.items()[0].actual_minutes(), None);
        assert_eq!(s.items()[0].elapsed_ms, 120_000);
        assert_eq!(s.items()[0].start_time_ms(), Some(150_000));
        // former active item banked its 30s and went back to pending
        assert_eq!(s.items()[1].elapsed_ms, 30_000);
        assert_matches!(s.items()[1].state, ItemState::Pending);
        assert!(at_most_one_active(&s));
    }

    #[test]
    fn test_previous_at_first_item_is_noop() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(1_000);
        s.previous(2_000);

        assert_eq!(s.active_index(), Some(0));
        assert_eq!(s.items()[0].start_time_ms(), Some(1_000));
    }

    #[test]
    fn test_previous_with_no_active_reactivates_last_completed() {
        let mut s = MeetingSession::in_memory(items(3));
        s.start(0);
        s.advance(60_000);
        s.advance(120_000);
        s.pause(130_000);
        assert_eq!(s.active_index(), None);

        s.previous(140_000);

        assert_eq!(s.active_index(), Some(1));
        assert!(s.is_running());
        assert_eq!(s.items()[1].elapsed_ms, 60_000);
        assert_eq!(s.items()[1].actual_minutes(), None);
    }

    #[test]
    fn test_previous_with_nothing_to_rewind_is_noop() {
        let mut s = MeetingSession::in_memory(items(2));
        s.previous(1_000);
        assert!(!s.is_running());
        assert!(s.items().iter().all(|i| i.is_untouched()));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut s = MeetingSession::in_memory(items(3));
        s.start(0);
        s.advance(60_000);
        s.reset(70_000);

        assert!(!s.is_running());
        assert!(s.items().iter().all(|i| i.is_untouched()));
        assert_eq!(s.phase(), MeetingPhase::NotStarted);
    }

    #[test]
    fn test_add_item_mid_meeting() {
        let mut s = MeetingSession::in_memory(items(1));
        s.start(0);
        let id = s.add_item("Late addition", 3.0, 1_000);

        assert_eq!(s.items().len(), 2);
        let added = s.items().iter().find(|i| i.id == id).unwrap();
        assert!(added.is_untouched());
        // the running item is undisturbed
        assert_eq!(s.active_index(), Some(0));
    }

    #[test]
    fn test_edit_item_any_state_leaves_timing() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        s.advance(125_000);

        let id = s.items()[0].id.clone();
        s.edit_item(&id, "Renamed", 9.0, 200_000);

        assert_eq!(s.items()[0].name, "Renamed");
        assert_eq!(s.items()[0].estimated_minutes, 9.0);
        assert_eq!(s.items()[0].actual_minutes(), Some(2.1));
        assert_eq!(s.items()[0].elapsed_ms, 125_000);
    }

    #[test]
    fn test_delete_untouched_pending_only() {
        let mut s = MeetingSession::in_memory(items(3));
        s.start(0);
        s.pause(10_000); // item 0 now has banked time

        let touched = s.items()[0].id.clone();
        let fresh = s.items()[2].id.clone();

        s.delete_item(&touched, 20_000);
        assert_eq!(s.items().len(), 3);

        s.delete_item(&fresh, 20_000);
        assert_eq!(s.items().len(), 2);
    }

    #[test]
    fn test_delete_active_item_is_noop() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        let id = s.items()[0].id.clone();
        s.delete_item(&id, 1_000);
        assert_eq!(s.items().len(), 2);
        assert_eq!(s.active_index(), Some(0));
    }

    #[test]
    fn test_reorder_non_active_keeps_timing() {
        let mut s = MeetingSession::in_memory(items(3));
        s.start(0);
        s.advance(60_000);
        s.pause(70_000); // item 1 banked 10s, nothing active

        let moved = s.items()[1].id.clone();
        s.reorder_item(1, 2, 80_000);

        assert_eq!(s.items()[2].id, moved);
        assert_eq!(s.items()[2].elapsed_ms, 10_000);
    }

    #[test]
    fn test_reorder_active_item_is_noop() {
        let mut s = MeetingSession::in_memory(items(3));
        s.start(0);
        s.reorder_item(0, 2, 1_000);
        assert_eq!(s.active_index(), Some(0));
    }

    #[test]
    fn test_reorder_out_of_bounds_is_noop() {
        let mut s = MeetingSession::in_memory(items(2));
        s.reorder_item(1, 5, 0);
        s.reorder_item(7, 0, 0);
        assert_eq!(s.items().len(), 2);
    }

    #[test]
    fn test_at_most_one_active_across_transitions() {
        let mut s = MeetingSession::in_memory(items(4));
        let steps: Vec<(&str, i64)> = vec![
            ("start", 0),
            ("advance", 10_000),
            ("pause", 20_000),
            ("start", 30_000),
            ("previous", 40_000),
            ("advance", 50_000),
            ("advance", 60_000),
            ("reset", 70_000),
            ("start", 80_000),
        ];
        for (op, now) in steps {
            match op {
                "start" => s.start(now),
                "pause" => s.pause(now),
                "advance" => s.advance(now),
                "previous" => s.previous(now),
                "reset" => s.reset(now),
                _ => unreachable!(),
            }
            assert!(at_most_one_active(&s), "violated after {op}@{now}");
        }
    }

    #[test]
    fn test_restore_replays_unloaded_time() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        s.advance(60_000); // item 1 active, started at 60s, elapsed 0

        let payload = SessionPayload {
            agenda_items: s.items().to_vec(),
            is_running: s.is_running(),
            saved_at: 90_000,
        };

        // process restarts much later
        let restored = MeetingSession::from_payload(payload, 500_000, None);
        assert_eq!(restored.items()[1].elapsed_ms, 500_000 - 60_000);
        assert_eq!(restored.items()[1].start_time_ms(), Some(500_000));
        assert!(restored.is_running());
        // the completed item came back untouched
        assert_eq!(restored.items()[0].actual_minutes(), Some(1.0));
    }

    #[test]
    fn test_restore_non_active_items_unchanged() {
        let mut s = MeetingSession::in_memory(items(2));
        s.start(0);
        s.pause(15_000);

        let payload = SessionPayload {
            agenda_items: s.items().to_vec(),
            is_running: false,
            saved_at: 15_000,
        };
        let restored = MeetingSession::from_payload(payload, 900_000, None);
        assert_eq!(restored.items()[0].elapsed_ms, 15_000);
        assert!(!restored.is_running());
    }

    #[test]
    fn test_load_missing_store_seeds_sample() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::FileSessionStore::with_path(dir.path().join("none.json"));
        let s = MeetingSession::load(Box::new(store), 1_000);
        assert_eq!(s.items().len(), sample_agenda().len());
        assert!(!s.is_running());
    }

    #[test]
    fn test_load_corrupt_store_seeds_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"garbage").unwrap();
        let store = crate::store::FileSessionStore::with_path(&path);
        let s = MeetingSession::load(Box::new(store), 1_000);
        assert_eq!(s.items().len(), sample_agenda().len());
    }

    #[test]
    fn test_mutations_mirror_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = crate::store::FileSessionStore::with_path(&path);
        let read_back = crate::store::FileSessionStore::with_path(&path);

        let mut s = MeetingSession::new(items(2), Some(Box::new(store)));
        s.start(1_000);

        let payload = read_back.load_session().unwrap().unwrap();
        assert!(payload.is_running);
        assert_eq!(payload.saved_at, 1_000);
        assert_eq!(payload.agenda_items[0].start_time_ms(), Some(1_000));

        s.pause(2_000);
        let payload = read_back.load_session().unwrap().unwrap();
        assert!(!payload.is_running);
        assert_eq!(payload.agenda_items[0].elapsed_ms, 1_000);
    }

    #[test]
    fn test_store_failure_does_not_break_transitions() {
        let dir = tempfile::tempdir().unwrap();
        // pointing the store at a directory makes every save fail
        let store = crate::store::FileSessionStore::with_path(dir.path());
        let mut s = MeetingSession::new(items(1), Some(Box::new(store)));

        s.start(1_000);
        s.advance(61_000);

        assert_eq!(s.items()[0].actual_minutes(), Some(1.0));
    }
}
