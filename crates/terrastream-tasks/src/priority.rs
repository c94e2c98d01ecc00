use std::cmp::Ordering;

/// Scheduling priority of a task. Declared from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    /// Interactive work near the observer (block edits, the observer's own chunk).
    High = 0,
    /// Regular streaming loads.
    Medium = 1,
    /// Background housekeeping (unloads).
    Low = 2,
    /// Work that may wait indefinitely (opportunistic saves).
    #[default]
    None = 3,
}

impl Priority {
    /// All priorities, most urgent first.
    pub const ALL: [Priority; 4] = [
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::None,
    ];

    fn urgency(self) -> u8 {
        Priority::None as u8 - self as u8
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `High > Medium > Low > None`, so a max-heap pops the most urgent first.
impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.urgency().cmp(&other.urgency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert!(Priority::Low > Priority::None);
        let mut sorted = vec![Priority::Low, Priority::None, Priority::High, Priority::Medium];
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sorted, Priority::ALL.to_vec());
    }
}
