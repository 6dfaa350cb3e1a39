use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// Terminal focus changed; `true` means foreground.
    Focus(bool),
}

/// Source of terminal events (keyboard, resize, focus)
pub trait AppEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source using crossterm. The reader thread exits when
/// the receiving side is dropped, so the source owns its teardown.
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(AppEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::FocusGained) => {
                    if tx.send(AppEvent::Focus(true)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::FocusLost) => {
                    if tx.send(AppEvent::Focus(false)).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl AppEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time. Ticks
/// are produced by the receive timeout rather than a free-running timer
/// thread, so there is no tick handle to leak when the runner is dropped.
pub struct Runner<E: AppEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: AppEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}
