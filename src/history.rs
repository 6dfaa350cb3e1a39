use crate::agenda::AgendaItem;
use crate::session::MeetingSession;
use crate::store::HistoryStore;
use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use rand::Rng;
use std::path::Path;

/// Most-recent-first archive length cap. Saving an 11th meeting evicts the
/// oldest.
pub const HISTORY_CAP: usize = 10;

/// One archived meeting: the completed agenda items as they stood at save
/// time. Incomplete items are dropped, never archived partially.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    /// ISO-8601 save timestamp.
    pub date: String,
    pub agenda_items: Vec<AgendaItem>,
}

impl Meeting {
    pub fn from_completed_items(agenda_items: Vec<AgendaItem>, now_ms: i64) -> Self {
        let date = match Utc.timestamp_millis_opt(now_ms) {
            chrono::LocalResult::Single(dt) => dt.to_rfc3339(),
            _ => Utc::now().to_rfc3339(),
        };
        Self {
            id: format!("meeting-{:08x}", rand::thread_rng().gen::<u32>()),
            date,
            agenda_items,
        }
    }

    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn total_actual_minutes(&self) -> f64 {
        self.agenda_items
            .iter()
            .filter_map(|i| i.actual_minutes())
            .sum()
    }

    pub fn total_estimated_minutes(&self) -> f64 {
        self.agenda_items.iter().map(|i| i.estimated_minutes).sum()
    }
}

/// The bounded, newest-first archive of completed meetings.
#[derive(Debug)]
pub struct History {
    meetings: Vec<Meeting>,
    store: Option<Box<dyn HistoryStore>>,
}

impl History {
    /// Load the archive, falling back to empty on any storage failure.
    pub fn load(store: Box<dyn HistoryStore>) -> Self {
        let meetings = match store.load_history() {
            Ok(meetings) => meetings,
            Err(err) => {
                warn!("failed to load meeting history, starting empty: {err}");
                Vec::new()
            }
        };
        Self {
            meetings,
            store: Some(store),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            meetings: Vec::new(),
            store: None,
        }
    }

    pub fn meetings(&self) -> &[Meeting] {
        &self.meetings
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }

    /// Archive the session's completed items as a new meeting, newest
    /// first, evicting beyond the cap, then clear the live session. No-op
    /// unless at least one item has a committed actual. The in-memory
    /// archive is updated even when the durable write fails, so the save
    /// is visible regardless.
    pub fn archive(&mut self, session: &mut MeetingSession, now_ms: i64) -> bool {
        if !session.has_completed_items() {
            return false;
        }
        let meeting = Meeting::from_completed_items(session.completed_items(), now_ms);
        self.meetings.insert(0, meeting);
        self.meetings.truncate(HISTORY_CAP);

        if let Some(store) = &self.store {
            if let Err(err) = store.save_history(&self.meetings) {
                warn!("failed to persist meeting history: {err}");
            }
        }
        session.clear_after_archive();
        true
    }

    /// Flatten the archive to CSV rows for review outside the app.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record([
            "meeting_id",
            "date",
            "item",
            "estimated_minutes",
            "actual_minutes",
        ])?;
        for meeting in &self.meetings {
            for item in &meeting.agenda_items {
                let estimated = format!("{}", item.estimated_minutes);
                let actual = item
                    .actual_minutes()
                    .map(|m| format!("{m}"))
                    .unwrap_or_default();
                wtr.write_record([
                    meeting.id.as_str(),
                    meeting.date.as_str(),
                    item.name.as_str(),
                    estimated.as_str(),
                    actual.as_str(),
                ])?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}
