//! Basic geometry of the plotter: machine coordinates, per-axis step
//! resolution, and conversion between millimeters and stepper steps.
//!
//! The plotter is a plain cartesian machine: the X and Y steppers each move
//! the head along one axis, so unlike a hanging plotter there's no
//! non-linear transform between the drawing plane and the motors. What's
//! left is bookkeeping, but it's bookkeeping that has to be done exactly the
//! same way every time: positions are always converted from absolute
//! coordinates, so that rounding errors never accumulate over a long job.
//!
//! This crate supports `no_std` and uses `libm` to allow for running in
//! embedded contexts.

#![cfg_attr(not(feature = "std"), no_std)]

use serde::{Deserialize, Serialize};

pub type Angle = euclid::Angle<f32>;
pub type Point = euclid::Point2D<f32, Mm>;

/// The unit of machine coordinates.
pub struct Mm;

pub trait FromKurbo {
    type Input;
    fn from_kurbo(p: Self::Input) -> Self;
}

#[cfg(feature = "kurbo")]
impl FromKurbo for Point {
    type Input = kurbo::Point;
    fn from_kurbo(p: kurbo::Point) -> Self {
        Point::new(p.x as f32, p.y as f32)
    }
}

#[cfg(feature = "kurbo")]
pub fn to_kurbo(p: &Point) -> kurbo::Point {
    kurbo::Point::new(p.x.into(), p.y.into())
}

/// A pair of values, one for each axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XY<T> {
    pub x: T,
    pub y: T,
}

impl<T> XY<T> {
    pub fn new(x: T, y: T) -> Self {
        XY { x, y }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> XY<U> {
        XY {
            x: f(self.x),
            y: f(self.y),
        }
    }
}

/// Which way an arc sweeps, looking down at the paper with Y pointing up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// The position of the stepper motors, measured in steps from the origin.
pub type StepPositions = XY<i32>;

impl StepPositions {
    /// The signed number of steps each axis needs to take to get from `self` to `to`.
    ///
    /// Exact for positions within [`MAX_STEPS`] of the origin; anything else
    /// saturates.
    pub fn delta_to(&self, to: &StepPositions) -> XY<i32> {
        XY {
            x: to.x.saturating_sub(self.x),
            y: to.y.saturating_sub(self.y),
        }
    }
}

/// How far from the origin, in steps, a position may be. Staying within half
/// of the `i32` range means the distance between any two positions fits too.
pub const MAX_STEPS: i32 = i32::MAX / 2;

/// Immutable configuration of a single stepped axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Steps per millimeter of travel, including microstepping.
    pub steps_per_mm: f32,
    /// How long the step line is held high (and then low) for each pulse.
    pub min_pulse_width_us: u32,
    /// Some motors are wired the other way round: positive travel then needs
    /// a low direction line.
    #[serde(default)]
    pub invert_direction: bool,
}

impl AxisSpec {
    pub fn to_steps(&self, mm: f32) -> i32 {
        libm::roundf(mm * self.steps_per_mm) as i32
    }

    /// Like [`AxisSpec::to_steps`], but `None` if the result is further than
    /// [`MAX_STEPS`] from the origin (or not a number at all).
    pub fn checked_steps(&self, mm: f32) -> Option<i32> {
        let steps = libm::roundf(mm * self.steps_per_mm);
        (libm::fabsf(steps) < MAX_STEPS as f32).then_some(steps as i32)
    }

    pub fn to_mm(&self, steps: i32) -> f32 {
        steps as f32 / self.steps_per_mm
    }

    /// The level of the direction line for moving by `steps`.
    ///
    /// Zero-length moves get the same level as negative ones; they never
    /// pulse, so it doesn't matter.
    pub fn direction_level(&self, steps: i32) -> bool {
        (steps > 0) != self.invert_direction
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenConfig {
    /// PWM duty for lifting the pen.
    pub up_duty: u16,
    /// PWM duty for lowering the pen.
    pub down_duty: u16,
    /// How long the servo gets to settle after each change.
    pub settle_ms: u32,
}

pub struct ConfigBuilder {
    axes: XY<AxisSpec>,
    max_steps_per_sec: u32,
    acceleration: u32,
    max_ramp_steps: Option<u32>,
    pen: PenConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        let axis = AxisSpec {
            steps_per_mm: 20.0,
            min_pulse_width_us: 2,
            invert_direction: false,
        };
        Self {
            axes: XY::new(axis, axis),
            max_steps_per_sec: 1000,
            acceleration: 500,
            max_ramp_steps: None,
            pen: PenConfig {
                up_duty: 10,
                down_duty: 100,
                settle_ms: 500,
            },
        }
    }
}

impl ConfigBuilder {
    pub fn build(&self) -> Config {
        Config {
            axes: self.axes,
            max_steps_per_sec: self.max_steps_per_sec.max(1),
            acceleration: self.acceleration.max(1),
            max_ramp_steps: self.max_ramp_steps,
            pen: self.pen,
        }
    }

    pub fn with_steps_per_mm(&mut self, x: f32, y: f32) -> &mut Self {
        self.axes.x.steps_per_mm = x;
        self.axes.y.steps_per_mm = y;
        self
    }

    pub fn with_min_pulse_width_us(&mut self, us: u32) -> &mut Self {
        self.axes.x.min_pulse_width_us = us;
        self.axes.y.min_pulse_width_us = us;
        self
    }

    pub fn with_axes(&mut self, axes: XY<AxisSpec>) -> &mut Self {
        self.axes = axes;
        self
    }

    pub fn with_max_steps_per_sec(&mut self, steps: u32) -> &mut Self {
        self.max_steps_per_sec = steps;
        self
    }

    pub fn with_acceleration(&mut self, steps_per_sec_per_sec: u32) -> &mut Self {
        self.acceleration = steps_per_sec_per_sec;
        self
    }

    pub fn with_max_ramp_steps(&mut self, steps: Option<u32>) -> &mut Self {
        self.max_ramp_steps = steps;
        self
    }

    pub fn with_pen(&mut self, pen: PenConfig) -> &mut Self {
        self.pen = pen;
        self
    }
}

/// The configuration of a plotter. Created at startup and never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub axes: XY<AxisSpec>,
    /// The constant step rate of rapid moves and arcs. Linear moves don't
    /// look at this: their top speed comes from `acceleration`.
    pub max_steps_per_sec: u32,
    /// Acceleration of linear moves, in steps per second per second.
    pub acceleration: u32,
    /// If set, linear moves spend at most this many steps accelerating (and
    /// the same decelerating) and cruise at full speed in between. If unset,
    /// a linear move accelerates over its first half and decelerates over
    /// the second.
    pub max_ramp_steps: Option<u32>,
    pub pen: PenConfig,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

impl Config {
    pub fn point_to_steps(&self, p: &Point) -> StepPositions {
        XY {
            x: self.axes.x.to_steps(p.x),
            y: self.axes.y.to_steps(p.y),
        }
    }

    pub fn checked_point_to_steps(&self, p: &Point) -> Option<StepPositions> {
        Some(XY {
            x: self.axes.x.checked_steps(p.x)?,
            y: self.axes.y.checked_steps(p.y)?,
        })
    }

    pub fn steps_to_point(&self, steps: &StepPositions) -> Point {
        Point::new(self.axes.x.to_mm(steps.x), self.axes.y.to_mm(steps.y))
    }

    /// The delay between steps of a rapid move.
    pub fn rapid_delay_us(&self) -> u32 {
        1_000_000 / self.max_steps_per_sec.max(1)
    }

    /// The delay between steps of a linear move, once it reaches full speed.
    ///
    /// A step taken from rest with constant acceleration `a` takes
    /// `1/sqrt(2a)` seconds.
    pub fn base_delay_us(&self) -> f32 {
        1_000_000.0 / libm::sqrtf(2.0 * self.acceleration.max(1) as f32)
    }
}
