use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Rolling send budget
///
/// Keeps the timestamp of every frame sent within the last `window`.
/// Regular frames may use `budget - reserved` of it, priority frames all of it.
#[derive(Debug)]
pub struct SendWindow {
    sent: VecDeque<Instant>,
    window: Duration,
    budget: u32,
    reserved: u32,
    last_warned: Option<Instant>,
}

impl SendWindow {
    #[must_use]
    pub fn new(budget: u32, reserved: u32, window: Duration) -> Self {
        let budget = budget.max(1);
        Self {
            sent: VecDeque::with_capacity(budget as usize),
            window,
            budget,
            reserved: reserved.min(budget - 1),
            last_warned: None,
        }
    }

    fn prune(&mut self, now: Instant) {
        while self
            .sent
            .front()
            .is_some_and(|sent| *sent + self.window <= now)
        {
            self.sent.pop_front();
        }
    }

    fn limit(&self, priority: bool) -> usize {
        if priority {
            self.budget as usize
        } else {
            (self.budget - self.reserved) as usize
        }
    }

    /// Take a slot for one frame
    ///
    /// # Errors
    /// Returns the instant at which a slot of this class frees up.
    pub fn try_acquire(&mut self, priority: bool, now: Instant) -> Result<(), Instant> {
        self.prune(now);
        let limit = self.limit(priority);

        if self.sent.len() < limit {
            self.sent.push_back(now);
            return Ok(());
        }

        // The frame that has to age out before the count drops below `limit`
        let blocking = self.sent.len() - limit;
        Err(self.sent[blocking] + self.window)
    }

    /// Frames counted in the window ending at `now`
    pub fn in_flight(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.sent.len()
    }

    /// Whether a throttling warning should be logged, at most once per window
    pub fn should_warn(&mut self, now: Instant) -> bool {
        let due = self
            .last_warned
            .is_none_or(|last| last + self.window <= now);
        if due {
            self.last_warned = Some(now);
        }
        due
    }

    pub fn clear(&mut self) {
        self.sent.clear();
        self.last_warned = None;
    }
}
