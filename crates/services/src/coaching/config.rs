use chrono::Duration;

/// Timing and threshold knobs for the live hint generator.
#[derive(Debug, Clone, PartialEq)]
pub struct CoachingConfig {
    /// Minimum gap between two shown hints, whatever their priority.
    pub cooldown: Duration,
    /// How long the draft must stay empty after a counterpart turn.
    pub idle_delay: Duration,
    /// Quiet period after which a random reminder may be shown.
    pub fallback_window: Duration,
    /// Closing tip fires while remaining time is in `(start, end]`.
    pub closing_window: (Duration, Duration),
    /// Draft longer than `length_factor` × ideal max triggers a warning.
    pub length_factor: f64,
}

impl Default for CoachingConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::seconds(8),
            idle_delay: Duration::seconds(15),
            fallback_window: Duration::seconds(20),
            closing_window: (Duration::seconds(15), Duration::seconds(45)),
            length_factor: 1.5,
        }
    }
}

impl CoachingConfig {
    #[must_use]
    pub fn in_closing_window(&self, remaining: Duration) -> bool {
        let (start, end) = self.closing_window;
        remaining > start && remaining <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_window_is_open_below_and_closed_above() {
        let config = CoachingConfig::default();
        assert!(!config.in_closing_window(Duration::seconds(15)));
        assert!(config.in_closing_window(Duration::seconds(16)));
        assert!(config.in_closing_window(Duration::seconds(45)));
        assert!(!config.in_closing_window(Duration::seconds(46)));
    }
}
