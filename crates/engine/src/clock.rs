/// Game time in milliseconds. Advances only through `advance`, so tests drive
/// it deterministically and the window loop feeds it fixed ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameClock {
    now_ms: u64,
}

impl GameClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now_ms: start_ms }
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn advance(&mut self, elapsed_ms: u64) {
        self.now_ms = self.now_ms.saturating_add(elapsed_ms);
    }
}

/// Records when an object was suspended so its dates can be shifted on resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Suspension {
    suspended: bool,
    when_suspended: u64,
}

impl Suspension {
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Returns the interval to add to stored dates, non-zero only when resuming.
    pub fn set(&mut self, suspended: bool, now: u64) -> u64 {
        if suspended == self.suspended {
            return 0;
        }
        self.suspended = suspended;
        if suspended {
            self.when_suspended = now;
            0
        } else {
            now.saturating_sub(self.when_suspended)
        }
    }
}
