use std::ops::RangeInclusive;
use std::time::Duration;

use rand::{thread_rng, Rng};
use tokio::time::Instant;

/// Draws a timeout uniformly from `range`, different nodes pick different values
/// so that they rarely start competing elections at the same time
pub fn random_election_timeout(range: &RangeInclusive<Duration>) -> Duration {
    thread_rng().gen_range(range.clone())
}

/// Single-shot election deadline.
///
/// The timer does not run by itself: behaviors wait on `deadline()` next to their mailbox,
/// so resetting it just moves the deadline and never races with a pending fire.
#[derive(Debug)]
pub struct ElectionTimer {
    range: RangeInclusive<Duration>,
    deadline: Instant,
}

impl ElectionTimer {
    pub fn new(range: RangeInclusive<Duration>) -> Self {
        let deadline = Instant::now() + random_election_timeout(&range);
        Self { range, deadline }
    }

    /// Cancels the pending deadline and schedules a new random one
    pub fn reset(&mut self) {
        self.deadline = Instant::now() + random_election_timeout(&self.range);
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[cfg(test)]
    pub fn has_fired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
