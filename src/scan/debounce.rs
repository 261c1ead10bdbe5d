use std::time::Duration;

use tokio::time::Instant;

/// Accepts a trigger only once per cooldown window.
///
/// A QR code stays in view for many frames; without this every frame would
/// start its own validation request.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    /// Any accepted trigger starts a new window, whatever it carried.
    pub fn should_accept(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.cooldown => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_inside_the_window_are_dropped() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));

        assert!(debouncer.should_accept(start));
        for ms in [1, 100, 250, 499] {
            assert!(!debouncer.should_accept(start + Duration::from_millis(ms)));
        }
        assert!(debouncer.should_accept(start + Duration::from_millis(500)));
    }

    #[test]
    fn dropped_triggers_do_not_extend_the_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));

        assert!(debouncer.should_accept(start));
        assert!(!debouncer.should_accept(start + Duration::from_millis(400)));
        assert!(debouncer.should_accept(start + Duration::from_millis(600)));
    }
}
