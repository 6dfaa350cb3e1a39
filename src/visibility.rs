//! Foreground/background reconciliation for the active item's open
//! interval. The host signal is the terminal's focus events; the policy is
//! the same for any show/hide source:
//!
//! - on hide, the open interval is banked and the start time re-based, so
//!   backgrounded wall time is credited exactly once at the moment of the
//!   hide event;
//! - on show, the start time is re-based again, so the backgrounded span is
//!   never credited a second time.
//!
//! Both hooks are inert while the meeting is not running.

use crate::session::MeetingSession;

/// The page/terminal went to the background.
pub fn on_hide(session: &mut MeetingSession, now_ms: i64) {
    if !session.is_running() {
        return;
    }
    session.bank_and_rebase_active(now_ms);
    session.persist(now_ms);
}

/// The page/terminal returned to the foreground.
pub fn on_show(session: &mut MeetingSession, now_ms: i64) {
    if !session.is_running() {
        return;
    }
    session.rebase_active(now_ms);
    session.persist(now_ms);
}
