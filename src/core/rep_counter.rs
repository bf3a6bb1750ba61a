// Hysteresis-based repetition counting for a single limb side

use serde::{Deserialize, Serialize};

/// Angle band used to debounce one tracked joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Entering above this angle marks the limb extended
    pub extended: f64,
    /// Dropping below this angle after extension completes a rep
    pub contracted: f64,
}

impl Thresholds {
    pub const fn new(extended: f64, contracted: f64) -> Self {
        Self {
            extended,
            contracted,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.extended > self.contracted
            && (0.0..=180.0).contains(&self.extended)
            && (0.0..=180.0).contains(&self.contracted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideState {
    #[default]
    Unset,
    High,
    Low,
}

/// Per-side counter. No rep is counted until the first `High` observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepCounter {
    state: SideState,
    count: u32,
}

impl RepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SideState {
        self.state
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Feed one angle sample. Returns the new count when a rep completes.
    pub fn update(&mut self, angle: f64, thresholds: &Thresholds) -> Option<u32> {
        if angle > thresholds.extended {
            self.state = SideState::High;
            return None;
        }

        if angle < thresholds.contracted && self.state == SideState::High {
            self.state = SideState::Low;
            self.count += 1;
            return Some(self.count);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURL: Thresholds = Thresholds::new(160.0, 30.0);

    fn feed(counter: &mut RepCounter, angles: &[f64]) -> usize {
        angles
            .iter()
            .filter(|angle| counter.update(**angle, &CURL).is_some())
            .count()
    }

    #[test]
    fn test_two_full_cycles_count_twice() {
        let mut counter = RepCounter::new();
        let increments = feed(&mut counter, &[170.0, 20.0, 170.0, 20.0]);
        assert_eq!(increments, 2);
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.state(), SideState::Low);
    }

    #[test]
    fn test_low_oscillation_never_counts() {
        let mut counter = RepCounter::new();
        let angles: Vec<f64> = (0..200)
            .map(|i| if i % 2 == 0 { 25.0 } else { 35.0 })
            .collect();
        assert_eq!(feed(&mut counter, &angles), 0);
        assert_eq!(counter.state(), SideState::Unset);
    }

    #[test]
    fn test_jitter_at_low_threshold_counts_once() {
        let mut counter = RepCounter::new();
        let increments = feed(&mut counter, &[170.0, 29.0, 31.0, 29.0, 31.0, 28.0]);
        assert_eq!(increments, 1);
    }

    #[test]
    fn test_values_inside_band_leave_state() {
        let mut counter = RepCounter::new();
        counter.update(165.0, &CURL);
        for angle in [150.0, 100.0, 60.0, 30.0] {
            assert_eq!(counter.update(angle, &CURL), None);
            assert_eq!(counter.state(), SideState::High);
        }
        assert_eq!(counter.update(29.9, &CURL), Some(1));
    }

    #[test]
    fn test_starting_contracted_needs_extension_first() {
        let mut counter = RepCounter::new();
        assert_eq!(counter.update(10.0, &CURL), None);
        assert_eq!(counter.state(), SideState::Unset);
        assert_eq!(counter.update(175.0, &CURL), None);
        assert_eq!(counter.update(10.0, &CURL), Some(1));
    }

    #[test]
    fn test_threshold_validity() {
        assert!(CURL.is_valid());
        assert!(!Thresholds::new(30.0, 160.0).is_valid());
        assert!(!Thresholds::new(200.0, 30.0).is_valid());
    }
}
