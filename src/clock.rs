use chrono::Utc;

/// The single source of wall-clock truth for the app.
///
/// `current_ms` is the cached display time, refreshed once per tick while
/// `running` is true; while paused the last value is retained, never reset.
/// Transitions take their `now` from [`Clock::sample`], which always reads
/// the wall clock fresh so a paused display never stales a state change.
#[derive(Debug, Clone)]
pub struct Clock {
    current_ms: i64,
    running: bool,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            current_ms: Self::wall_ms(),
            running: false,
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn wall_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Cached display time, updated at tick granularity while running.
    pub fn current_ms(&self) -> i64 {
        self.current_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Tick handler: refresh the cached time while running, hold it while
    /// paused.
    pub fn on_tick(&mut self) {
        if self.running {
            self.current_ms = Self::wall_ms();
        }
    }

    /// Fresh wall reading for a state transition. Also folds the reading
    /// into the cache while running so the display never lags a mutation.
    pub fn sample(&mut self) -> i64 {
        let now = Self::wall_ms();
        if self.running {
            self.current_ms = now;
        }
        now
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
