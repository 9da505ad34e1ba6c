use penplot_geom::{StepPositions, XY};

use crate::profile::VelocityProfile;

/// One iteration of a segment: which axes step, and how long to wait afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub x: bool,
    pub y: bool,
    pub delay_us: u32,
}

/// Where the per-step delays of a segment come from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Delays {
    /// Every step waits the same amount. Used for rapid moves and arcs.
    Constant(u32),
    /// Steps follow an acceleration ramp. Used for linear moves.
    Profile(VelocityProfile),
}

impl Delays {
    pub fn delay_us(&self, step: u32) -> u32 {
        match self {
            Delays::Constant(us) => *us,
            Delays::Profile(p) => p.delay_us(step),
        }
    }
}

/// A straight move between two points on the step grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: StepPositions,
    pub to: StepPositions,
    pub delays: Delays,
}

impl Segment {
    /// Signed step counts for each axis.
    pub fn steps(&self) -> XY<i32> {
        self.from.delta_to(&self.to)
    }

    /// The step count of the axis that moves furthest. This is the number of
    /// ticks in the segment.
    pub fn dominant_steps(&self) -> u32 {
        let steps = self.steps();
        steps.x.unsigned_abs().max(steps.y.unsigned_abs())
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    pub fn iter_steps(&self) -> StepIter {
        let steps = self.steps();
        let x = steps.x.unsigned_abs();
        let y = steps.y.unsigned_abs();
        let x_is_major = x >= y;
        let (major, minor) = if x_is_major { (x, y) } else { (y, x) };

        StepIter {
            delays: self.delays,
            major,
            minor,
            x_is_major,
            step: 0,
            err: i64::from(major / 2),
        }
    }
}

/// Interleaves the pulses of two axes so that they finish together.
///
/// This is a plain integer DDA: the major axis steps on every tick, and the
/// error accumulator decides which ticks the minor axis joins in. Over the
/// whole segment the minor axis steps exactly `minor` times, and after any
/// prefix of `k` ticks it has taken within one step of `k * minor / major`.
#[derive(Clone, Debug)]
pub struct StepIter {
    delays: Delays,
    major: u32,
    minor: u32,
    x_is_major: bool,

    // Number of ticks emitted so far.
    step: u32,

    // Always in `0..major` between ticks.
    err: i64,
}

impl Iterator for StepIter {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        if self.step >= self.major {
            return None;
        }

        let mut minor_steps = false;
        self.err -= i64::from(self.minor);
        if self.err < 0 {
            minor_steps = true;
            self.err += i64::from(self.major);
        }

        let delay_us = self.delays.delay_us(self.step);
        self.step += 1;

        Some(Tick {
            x: self.x_is_major || minor_steps,
            y: !self.x_is_major || minor_steps,
            delay_us,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.major - self.step) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StepIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn segment(x: i32, y: i32) -> Segment {
        Segment {
            from: XY::new(0, 0),
            to: XY::new(x, y),
            delays: Delays::Constant(1000),
        }
    }

    #[test]
    fn diagonal() {
        let ticks: Vec<_> = segment(3, -3).iter_steps().collect();
        assert_eq!(ticks.len(), 3);
        assert!(ticks.iter().all(|t| t.x && t.y && t.delay_us == 1000));
    }

    #[test]
    fn empty() {
        assert!(segment(0, 0).is_empty());
        assert_eq!(segment(0, 0).iter_steps().count(), 0);
    }

    #[test]
    fn two_to_one() {
        let ticks: Vec<_> = segment(4, 2).iter_steps().map(|t| (t.x, t.y)).collect();
        assert_eq!(
            ticks,
            vec![(true, false), (true, true), (true, false), (true, true)]
        );
    }

    #[test]
    fn profiled_delays_follow_the_profile() {
        let profile = VelocityProfile::new(10, 100.0);
        let seg = Segment {
            from: XY::new(5, 5),
            to: XY::new(-5, 8),
            delays: Delays::Profile(profile),
        };
        let delays: Vec<_> = seg.iter_steps().map(|t| t.delay_us).collect();
        let expected: Vec<_> = (0..10).map(|i| profile.delay_us(i)).collect();
        assert_eq!(delays, expected);
    }

    proptest! {
        #[test]
        fn test_step_count(x in -5000..5000i32, y in -5000..5000i32) {
            let seg = segment(x, y);
            let iter = seg.iter_steps();
            prop_assert_eq!(iter.len() as u32, x.unsigned_abs().max(y.unsigned_abs()));
            let x_count: u32 = seg.iter_steps().map(|t| u32::from(t.x)).sum();
            let y_count: u32 = seg.iter_steps().map(|t| u32::from(t.y)).sum();
            prop_assert_eq!(x_count, x.unsigned_abs());
            prop_assert_eq!(y_count, y.unsigned_abs());
        }

        // Every prefix of the segment has taken minor-axis steps in proportion
        // to the major-axis steps, give or take one.
        #[test]
        fn test_evenness(x in 0..2000i64, y in 0..2000i64) {
            let seg = segment(x as i32, y as i32);
            let (major, minor) = (x.max(y), x.min(y));
            let mut minor_count = 0i64;
            for (k, tick) in seg.iter_steps().enumerate() {
                let minor_stepped = if x >= y { tick.y } else { tick.x };
                minor_count += i64::from(minor_stepped);
                let k = k as i64 + 1;
                prop_assert!((minor_count * major - k * minor).abs() <= major);
            }
        }

        #[test]
        fn test_idle_axis_stays_idle(n in 0..5000i32) {
            prop_assert!(segment(n, 0).iter_steps().all(|t| t.x && !t.y));
            prop_assert!(segment(0, -n).iter_steps().all(|t| !t.x && t.y));
        }
    }
}
