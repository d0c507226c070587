//! Escalating overdue policy.

use tracing::{debug, warn};

use snapgrid_state::{CoordinatorConfig, NodeRecord, NodeStatus};

/// Outcome of assessing one record during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Heartbeat within the current threshold (or node not Online).
    Fresh,
    /// Threshold crossed; the record now carries this many overdue marks.
    Overdue(u32),
    /// Overdue marks reached the maximum; the record is now Offline.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverduePolicy {
    /// Base threshold in seconds.
    pub period_secs: u64,
    /// Marks at which a node is judged offline.
    pub max_times: u32,
}

impl Default for OverduePolicy {
    fn default() -> Self {
        Self {
            period_secs: 10,
            max_times: 3,
        }
    }
}

impl OverduePolicy {
    pub fn new(period_secs: u64, max_times: u32) -> Self {
        Self {
            period_secs,
            max_times,
        }
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(config.overdue_period, config.max_overdue_times)
    }

    /// Heartbeat age (seconds) a node with `overdue_count` marks must exceed
    /// to earn the next mark.
    pub fn threshold(&self, overdue_count: u32) -> u64 {
        self.period_secs.saturating_mul(u64::from(overdue_count) + 1)
    }

    pub fn is_overdue(&self, elapsed: u64, overdue_count: u32) -> bool {
        elapsed > self.threshold(overdue_count)
    }

    pub fn is_offline(&self, overdue_count: u32) -> bool {
        overdue_count >= self.max_times
    }

    /// Apply one sweep at `now` to `record`, mutating its overdue count and status.
    pub fn assess(&self, record: &mut NodeRecord, now: u64) -> Verdict {
        if record.status != NodeStatus::Online {
            return Verdict::Fresh;
        }

        let elapsed = now.saturating_sub(record.last_heartbeat);
        let mut verdict = Verdict::Fresh;
        if self.is_overdue(elapsed, record.overdue_count) {
            record.overdue_count += 1;
            debug!(
                addr = %record.addr(),
                elapsed,
                overdue = record.overdue_count,
                "node overdue"
            );
            verdict = Verdict::Overdue(record.overdue_count);
        }

        if self.is_offline(record.overdue_count) {
            record.status = NodeStatus::Offline;
            warn!(addr = %record.addr(), elapsed, "node is offline");
            return Verdict::Offline;
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapgrid_state::NodeAnnouncement;

    fn record_at(last_heartbeat: u64) -> NodeRecord {
        NodeRecord::from_announcement(&NodeAnnouncement::new("10.0.0.1", 10000), last_heartbeat)
    }

    #[test]
    fn thresholds_escalate() {
        let policy = OverduePolicy::new(10, 3);
        assert_eq!(policy.threshold(0), 10);
        assert_eq!(policy.threshold(1), 20);
        assert_eq!(policy.threshold(2), 30);
    }

    #[test]
    fn fresh_within_threshold() {
        let policy = OverduePolicy::new(10, 3);
        let mut record = record_at(100);
        assert_eq!(policy.assess(&mut record, 110), Verdict::Fresh);
        assert_eq!(record.overdue_count, 0);
    }

    #[test]
    fn first_mark_after_one_period() {
        let policy = OverduePolicy::new(10, 3);
        let mut record = record_at(100);
        assert_eq!(policy.assess(&mut record, 111), Verdict::Overdue(1));
    }

    #[test]
    fn second_mark_needs_double_period() {
        let policy = OverduePolicy::new(10, 3);
        let mut record = record_at(100);
        policy.assess(&mut record, 111);

        // Still only 19s stale: below the 20s threshold for the second mark.
        assert_eq!(policy.assess(&mut record, 119), Verdict::Fresh);
        assert_eq!(record.overdue_count, 1);

        assert_eq!(policy.assess(&mut record, 121), Verdict::Overdue(2));
    }

    #[test]
    fn offline_at_max_marks() {
        let policy = OverduePolicy::new(10, 3);
        let mut record = record_at(100);
        policy.assess(&mut record, 111);
        policy.assess(&mut record, 121);
        assert_eq!(policy.assess(&mut record, 131), Verdict::Offline);
        assert_eq!(record.status, NodeStatus::Offline);
        assert_eq!(record.overdue_count, 3);
    }

    #[test]
    fn offline_records_are_skipped() {
        let policy = OverduePolicy::new(10, 3);
        let mut record = record_at(0);
        record.status = NodeStatus::Offline;
        assert_eq!(policy.assess(&mut record, 1_000), Verdict::Fresh);
        assert_eq!(record.overdue_count, 0);
    }

    #[test]
    fn clock_skew_does_not_underflow() {
        let policy = OverduePolicy::default();
        let mut record = record_at(500);
        assert_eq!(policy.assess(&mut record, 100), Verdict::Fresh);
    }

    #[test]
    fn from_config_uses_coordinator_settings() {
        let config = CoordinatorConfig {
            overdue_period: 4,
            max_overdue_times: 5,
            ..Default::default()
        };
        assert_eq!(OverduePolicy::from_config(&config), OverduePolicy::new(4, 5));
    }
}
