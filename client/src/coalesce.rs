pub const TEXT_QUIET_MS: i32 = 500;

/// Trailing-edge debounce for editor text. Each keystroke bumps the
/// generation; only the timer armed by the latest keystroke may fire.
#[derive(Debug, Default)]
pub struct TextCoalescer {
    generation: u64,
    pending: Option<String>,
}

impl TextCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the latest text and returns the generation the caller's
    /// timer must present to [`fire`](Self::fire).
    pub fn push(&mut self, text: String) -> u64 {
        self.generation += 1;
        self.pending = Some(text);
        self.generation
    }

    pub fn fire(&mut self, generation: u64) -> Option<String> {
        if generation != self.generation {
            return None;
        }
        self.pending.take()
    }

    /// Sends whatever is pending right now and disarms outstanding timers.
    pub fn flush(&mut self) -> Option<String> {
        self.generation += 1;
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_timer_fires() {
        let mut coalescer = TextCoalescer::new();
        let first = coalescer.push("h".into());
        let second = coalescer.push("he".into());
        let third = coalescer.push("hey".into());
        assert_eq!(coalescer.fire(first), None);
        assert_eq!(coalescer.fire(second), None);
        assert_eq!(coalescer.fire(third).as_deref(), Some("hey"));
        assert_eq!(coalescer.fire(third), None);
    }

    #[test]
    fn flush_disarms_pending_timer() {
        let mut coalescer = TextCoalescer::new();
        let generation = coalescer.push("draft".into());
        assert_eq!(coalescer.flush().as_deref(), Some("draft"));
        assert_eq!(coalescer.fire(generation), None);
        assert_eq!(coalescer.flush(), None);
    }
}
