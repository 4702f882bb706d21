//! Simulated time in abstract ticks, refined by delta cycles.
//!
//! A tick carries no physical unit; the trace timescale decides what one tick
//! means when waveforms are written. Within a tick, every commit round opens
//! a new delta cycle so zero-delay propagation stays ordered.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A point in simulated time: a tick count plus the delta cycle within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// Simulated time in ticks.
    pub time: u64,
    /// Delta cycle index within the current tick.
    pub delta: u32,
}

impl SimTime {
    /// Tick zero, delta zero.
    pub fn zero() -> Self {
        Self { time: 0, delta: 0 }
    }

    /// Delta zero of the given tick.
    pub fn at(time: u64) -> Self {
        Self { time, delta: 0 }
    }

    /// Returns the next delta cycle of the same tick.
    pub fn next_delta(&self) -> Self {
        Self {
            time: self.time,
            delta: self.delta.saturating_add(1),
        }
    }

    /// Moves to a later tick, resetting the delta counter.
    ///
    /// Staying on the same tick keeps the delta count, so delta order is
    /// never rewound.
    pub fn advance_to(&self, time: u64) -> Self {
        debug_assert!(
            time >= self.time,
            "cannot advance backwards: {} -> {}",
            self.time,
            time
        );
        if time == self.time {
            *self
        } else {
            Self::at(time)
        }
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.delta.cmp(&other.delta))
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time)?;
        if self.delta > 0 {
            write!(f, "+d{}", self.delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_time() {
        let t = SimTime::zero();
        assert_eq!(t.time, 0);
        assert_eq!(t.delta, 0);
        assert_eq!(SimTime::default(), t);
    }

    #[test]
    fn next_delta() {
        let t = SimTime::at(5);
        let t2 = t.next_delta();
        assert_eq!(t2.time, 5);
        assert_eq!(t2.delta, 1);
        assert_eq!(t2.next_delta().delta, 2);
    }

    #[test]
    fn advance_resets_delta() {
        let t = SimTime { time: 100, delta: 5 };
        assert_eq!(t.advance_to(200), SimTime::at(200));
    }

    #[test]
    fn advance_to_same_tick_keeps_delta() {
        let t = SimTime { time: 100, delta: 5 };
        assert_eq!(t.advance_to(100), t);
    }

    #[test]
    fn ordering() {
        assert!(SimTime::at(1) < SimTime::at(2));
        assert!(SimTime { time: 3, delta: 0 } < SimTime { time: 3, delta: 1 });
        assert!(SimTime { time: 3, delta: 9 } < SimTime::at(4));
    }

    #[test]
    fn display() {
        assert_eq!(SimTime::zero().to_string(), "0");
        assert_eq!(SimTime { time: 40, delta: 2 }.to_string(), "40+d2");
    }

    #[test]
    fn serde_roundtrip() {
        let t = SimTime { time: 7, delta: 3 };
        let json = serde_json::to_string(&t).unwrap();
        let back: SimTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
