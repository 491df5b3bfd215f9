use prompterlink_shared::{CLOSE_DISPLAY_REPLACED, CLOSE_DISPLAY_TAKEN};

/// Bounded reconnect schedule. Attempts reset once a socket opens; after
/// `max_attempts` consecutive failures the client gives up.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    delay_ms: i32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay_ms: i32) -> Self {
        Self {
            max_attempts,
            delay_ms,
            attempts: 0,
        }
    }

    pub fn display() -> Self {
        Self::new(5, 3000)
    }

    pub fn controller() -> Self {
        Self::new(10, 2000)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Delay before the next attempt, or `None` once every attempt is spent
    /// or the relay handed the display slot to someone else.
    pub fn on_close(&mut self, code: u16) -> Option<i32> {
        if is_display_eviction(code) || self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.delay_ms)
    }
}

/// The relay closed this display because another one owns the slot.
pub fn is_display_eviction(code: u16) -> bool {
    code == CLOSE_DISPLAY_REPLACED || code == CLOSE_DISPLAY_TAKEN
}
