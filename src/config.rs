//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Ten years, the furthest a calendar walk looks for workable hours.
pub const DEFAULT_HORIZON_DAYS: u32 = 3650;

/// Tunables shared by a [`QueuesState`](crate::queues::QueuesState) and the
/// allocator working on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// How many days a calendar walk may advance (or go back) before giving
    /// up. Bounds the search on calendars with no workable hours.
    pub horizon_days: u32,
    /// When two dependencies join the same ordered pair of queue elements,
    /// keep the first and ignore the rest. When disabled, such snapshots are
    /// rejected by validation.
    pub collapse_duplicate_dependencies: bool,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            collapse_duplicate_dependencies: true,
        }
    }
}

impl AllocationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the calendar walk horizon.
    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    /// Sets whether duplicate dependencies are collapsed or rejected.
    pub fn with_collapse_duplicate_dependencies(mut self, collapse: bool) -> Self {
        self.collapse_duplicate_dependencies = collapse;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AllocationConfig::default();
        assert_eq!(config.horizon_days, DEFAULT_HORIZON_DAYS);
        assert!(config.collapse_duplicate_dependencies);
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: AllocationConfig = serde_json::from_str(r#"{"horizon_days": 30}"#).unwrap();
        assert_eq!(config, AllocationConfig::new().with_horizon_days(30));
    }
}
