/// Last known recognizer reachability. No history is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    Reachable,
    #[default]
    Unreachable,
}

impl ConnectivityState {
    pub fn is_reachable(self) -> bool {
        self == ConnectivityState::Reachable
    }
}

impl From<bool> for ConnectivityState {
    fn from(reachable: bool) -> Self {
        if reachable {
            ConnectivityState::Reachable
        } else {
            ConnectivityState::Unreachable
        }
    }
}

/// Owns `ConnectivityState`; the poll task feeds it one result per tick.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    state: ConnectivityState,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Overwrite with the latest poll. Returns true if reachability flipped.
    pub fn record(&mut self, reachable: bool) -> bool {
        let next = ConnectivityState::from(reachable);
        let changed = next != self.state;
        self.state = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unreachable() {
        assert!(!HealthMonitor::new().state().is_reachable());
    }

    #[test]
    fn test_record_reports_flips_only() {
        let mut monitor = HealthMonitor::new();
        assert!(monitor.record(true));
        assert!(!monitor.record(true));
        assert_eq!(monitor.state(), ConnectivityState::Reachable);
        assert!(monitor.record(false));
        assert_eq!(monitor.state(), ConnectivityState::Unreachable);
    }
}
