// Duration tracking for static holds (plank)

use std::time::Duration;
use tokio::time::Instant;

/// Posture angle range that counts as holding form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldBand {
    pub min: f64,
    pub max: f64,
}

impl HoldBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, angle: f64) -> bool {
        (self.min..=self.max).contains(&angle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEvent {
    /// Posture entered the band
    Started,
    /// Continuous hold reached another multiple of the milestone interval
    Milestone { seconds: u64 },
    /// Posture left the band after holding
    Broken { held: Duration },
}

/// Holding-timer state machine.
///
/// Idle until the posture enters the band, then Holding until it leaves.
/// Time spent in completed holds is banked so the reported total never shrinks.
#[derive(Debug, Clone)]
pub struct HoldTimer {
    milestone_interval: Duration,
    holding_since: Option<Instant>,
    milestones_this_hold: u64,
    total_milestones: u32,
    banked: Duration,
}

impl HoldTimer {
    pub fn new(milestone_interval: Duration) -> Self {
        Self {
            milestone_interval,
            holding_since: None,
            milestones_this_hold: 0,
            total_milestones: 0,
            banked: Duration::ZERO,
        }
    }

    pub fn is_holding(&self) -> bool {
        self.holding_since.is_some()
    }

    /// Length of the hold in progress
    pub fn current_hold(&self, now: Instant) -> Duration {
        self.holding_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or(Duration::ZERO)
    }

    /// Whole seconds held across all holds, including the current one
    pub fn total_held_secs(&self, now: Instant) -> u32 {
        (self.banked + self.current_hold(now)).as_secs() as u32
    }

    pub fn total_milestones(&self) -> u32 {
        self.total_milestones
    }

    pub fn update(&mut self, angle: f64, band: &HoldBand, now: Instant) -> Option<HoldEvent> {
        if !band.contains(angle) {
            let since = self.holding_since.take()?;
            let held = now.saturating_duration_since(since);
            self.banked += held;
            return Some(HoldEvent::Broken { held });
        }

        let since = match self.holding_since {
            Some(since) => since,
            None => {
                self.holding_since = Some(now);
                self.milestones_this_hold = 0;
                return Some(HoldEvent::Started);
            }
        };

        let interval_ms = self.milestone_interval.as_millis().max(1);
        let reached = (now.saturating_duration_since(since).as_millis() / interval_ms) as u64;
        if reached > self.milestones_this_hold {
            self.total_milestones += (reached - self.milestones_this_hold) as u32;
            self.milestones_this_hold = reached;
            return Some(HoldEvent::Milestone {
                seconds: reached * self.milestone_interval.as_secs(),
            });
        }

        None
    }
}
