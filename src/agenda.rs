use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MS_PER_MINUTE: f64 = 60_000.0;

/// Lifecycle of a single agenda item. Timing fields live on the variant
/// that needs them, so an item can never be active and completed at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ItemState {
    Pending,
    #[serde(rename_all = "camelCase")]
    Active { start_time_ms: i64 },
    #[serde(rename_all = "camelCase")]
    Completed { actual_minutes: f64 },
}

/// One line item of a meeting: a planned duration plus whatever time has
/// actually accrued against it so far.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub id: String,
    pub name: String,
    pub estimated_minutes: f64,
    /// Milliseconds banked from closed intervals. Excludes the currently
    /// open interval of an active item.
    #[serde(default)]
    pub elapsed_ms: i64,
    #[serde(default = "default_state")]
    pub state: ItemState,
}

fn default_state() -> ItemState {
    ItemState::Pending
}

impl AgendaItem {
    pub fn new(name: impl Into<String>, estimated_minutes: f64) -> Self {
        Self {
            id: new_item_id(),
            name: name.into(),
            estimated_minutes,
            elapsed_ms: 0,
            state: ItemState::Pending,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ItemState::Active { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, ItemState::Completed { .. })
    }

    pub fn start_time_ms(&self) -> Option<i64> {
        match self.state {
            ItemState::Active { start_time_ms } => Some(start_time_ms),
            _ => None,
        }
    }

    pub fn actual_minutes(&self) -> Option<f64> {
        match self.state {
            ItemState::Completed { actual_minutes } => Some(actual_minutes),
            _ => None,
        }
    }

    /// An item that never accrued any time. Only these may be deleted;
    /// anything with banked time is part of the meeting record.
    pub fn is_untouched(&self) -> bool {
        matches!(self.state, ItemState::Pending) && self.elapsed_ms == 0
    }
}

pub fn new_item_id() -> String {
    format!("item-{:08x}", rand::thread_rng().gen::<u32>())
}

/// Elapsed milliseconds for one item at `now_ms`: banked time plus the open
/// interval of an active item. Deliberately unclamped; a start time in the
/// future (clock skew) yields less than the banked value.
pub fn current_elapsed_ms(item: &AgendaItem, now_ms: i64) -> i64 {
    match item.state {
        ItemState::Active { start_time_ms } => item.elapsed_ms + (now_ms - start_time_ms),
        _ => item.elapsed_ms,
    }
}

/// Total elapsed across the agenda. Completed items contribute their
/// committed actual minutes, not a live recomputation, so completed totals
/// stay stable as `now_ms` advances.
pub fn total_elapsed_ms(items: &[AgendaItem], now_ms: i64) -> i64 {
    items
        .iter()
        .map(|item| match item.state {
            ItemState::Completed { actual_minutes } => (actual_minutes * MS_PER_MINUTE) as i64,
            _ => current_elapsed_ms(item, now_ms),
        })
        .sum()
}

pub fn total_estimated_ms(items: &[AgendaItem]) -> i64 {
    items
        .iter()
        .map(|item| (item.estimated_minutes * MS_PER_MINUTE) as i64)
        .sum()
}

/// Fixed seed agenda used when no stored session exists or the stored
/// payload fails to parse.
pub fn sample_agenda() -> Vec<AgendaItem> {
    vec![
        AgendaItem::new("Check-in", 5.0),
        AgendaItem::new("Project updates", 15.0),
        AgendaItem::new("Blockers", 10.0),
        AgendaItem::new("Action items", 5.0),
    ]
}
