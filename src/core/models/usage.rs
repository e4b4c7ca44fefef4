use chrono::{DateTime, Utc};

/// One rate-limit window as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaBucket {
    /// Percentage of the window already consumed (0.0 - 100.0).
    pub used_percent: f64,
    /// Window duration in minutes, when the provider reports one.
    pub window_minutes: Option<u64>,
    /// When the window resets.
    pub resets_at: Option<DateTime<Utc>>,
}

impl QuotaBucket {
    pub fn remaining_percent(&self) -> f64 {
        100.0 - self.used_percent
    }
}

/// Claude rate-limit snapshot from the OAuth usage endpoint.
#[derive(Debug, Clone, Default)]
pub struct ClaudeQuota {
    pub five_hour: Option<QuotaBucket>,
    pub seven_day: Option<QuotaBucket>,
    pub seven_day_opus: Option<QuotaBucket>,
}

/// Codex rate-limit snapshot read from local session files.
#[derive(Debug, Clone, Default)]
pub struct CodexQuota {
    /// Session window (usually 5 hours).
    pub primary: Option<QuotaBucket>,
    /// Weekly window.
    pub secondary: Option<QuotaBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_percent_is_complement_of_used() {
        let bucket = QuotaBucket {
            used_percent: 28.0,
            window_minutes: Some(300),
            resets_at: None,
        };
        assert!((bucket.remaining_percent() - 72.0).abs() < f64::EPSILON);
    }
}
