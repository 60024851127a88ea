//! Idle-streak state machine.

/// Where the streak stands after one observed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStatus {
    /// Usage at or above the threshold; streak is zero.
    Active,
    /// `n` consecutive idle intervals, fewer than the maximum.
    Idle(u32),
    /// The streak reached the maximum; the host should be powered off.
    Expired(u32),
}

impl IdleStatus {
    /// Consecutive idle intervals this status represents.
    #[must_use]
    pub const fn count(&self) -> u32 {
        match self {
            Self::Active => 0,
            Self::Idle(n) | Self::Expired(n) => *n,
        }
    }
}

/// Counts consecutive intervals with usage below a threshold.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    threshold: f64,
    max_idle: u32,
    count: u32,
}

impl IdleTracker {
    /// Create a tracker in the active state.
    #[must_use]
    pub const fn new(threshold: f64, max_idle: u32) -> Self {
        Self {
            threshold,
            max_idle,
            count: 0,
        }
    }

    /// Feed one interval's usage and return the resulting status.
    ///
    /// The count keeps growing past the maximum, so every further idle
    /// interval is [`IdleStatus::Expired`] until something resets it.
    pub fn observe(&mut self, usage: f64) -> IdleStatus {
        if usage < self.threshold {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
        self.status()
    }

    /// Current status without observing anything.
    #[must_use]
    pub const fn status(&self) -> IdleStatus {
        if self.count == 0 {
            IdleStatus::Active
        } else if self.count >= self.max_idle {
            IdleStatus::Expired(self.count)
        } else {
            IdleStatus::Idle(self.count)
        }
    }

    /// Consecutive idle intervals so far.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Back to the active state.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
