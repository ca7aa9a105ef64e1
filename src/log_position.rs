use std::cmp::Ordering;

use tokio::sync::watch;

/// Index and term of the most recent entry of a log, (0, 0) for an empty log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LogPosition {
    pub index: u64,
    pub term: u64,
}

impl LogPosition {
    pub const fn new(index: u64, term: u64) -> Self {
        Self { index, term }
    }

    /// Election restriction: a vote can only go to a candidate whose log is at least as up to date as ours
    pub fn is_at_least_as_up_to_date_as(&self, other: &LogPosition) -> bool {
        self >= other
    }
}

/// Compares the term of the last entry first, the index only breaks ties
impl Ord for LogPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.term.cmp(&other.term).then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for LogPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Read-only view of the log, owned by the replication layer
pub trait LogInspector: Send + 'static {
    fn last_log_position(&self) -> LogPosition;
}

/// A log that never moves, enough for nodes that only take part in elections
impl LogInspector for LogPosition {
    fn last_log_position(&self) -> LogPosition {
        *self
    }
}

/// The replication layer publishes its tail, the election core reads the latest value
impl LogInspector for watch::Receiver<LogPosition> {
    fn last_log_position(&self) -> LogPosition {
        *self.borrow()
    }
}
