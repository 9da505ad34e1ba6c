//! Simulated hardware, for running the interpreter without a plotter.
//!
//! Every simulated output appends to a shared [`Trace`], so after running
//! some commands you can ask exactly which pins toggled, which duties were
//! set and how long the machine would have spent waiting.

use std::{cell::RefCell, convert::Infallible, rc::Rc, time::Duration};

use embedded_hal::{delay::DelayNs, digital, pwm};
use penplot_geom::{AxisSpec, Config, StepPositions, XY};

use crate::{axis::StepDirAxis, Machine};

/// The digital outputs of the plotter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Line {
    XStep,
    XDir,
    YStep,
    YDir,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Level { line: Line, high: bool },
    Duty(u16),
    Wait(Duration),
}

#[derive(Clone, Debug, Default)]
pub struct Trace(Rc<RefCell<Vec<Event>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// The number of rising edges on `line`.
    pub fn pulses(&self, line: Line) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Level { line: l, high: true } if *l == line))
            .count()
    }

    pub fn total_wait(&self) -> Duration {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Wait(d) => Some(*d),
                _ => None,
            })
            .sum()
    }

    pub fn pin(&self, line: Line) -> SimPin {
        SimPin {
            line,
            trace: self.clone(),
        }
    }

    pub fn pwm(&self, max_duty: u16) -> SimPwm {
        SimPwm {
            max_duty,
            trace: self.clone(),
        }
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            trace: self.clone(),
        }
    }
}

pub struct SimPin {
    line: Line,
    trace: Trace,
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.trace.push(Event::Level {
            line: self.line,
            high: false,
        });
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.trace.push(Event::Level {
            line: self.line,
            high: true,
        });
        Ok(())
    }
}

pub struct SimPwm {
    max_duty: u16,
    trace: Trace,
}

impl pwm::ErrorType for SimPwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max_duty
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.trace.push(Event::Duty(duty));
        Ok(())
    }
}

/// A clock that records requested delays instead of waiting for them.
pub struct SimClock {
    trace: Trace,
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.trace.push(Event::Wait(Duration::from_nanos(u64::from(ns))));
    }

    fn delay_us(&mut self, us: u32) {
        self.trace.push(Event::Wait(Duration::from_micros(u64::from(us))));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.trace.push(Event::Wait(Duration::from_millis(u64::from(ms))));
    }
}

pub type SimAxis = StepDirAxis<SimPin, SimPin>;
pub type SimMachine = Machine<SimAxis, SimAxis, SimPwm, SimClock>;

/// A machine hooked up to simulated hardware, and the trace it records into.
///
/// The simulated PWM has a 10-bit duty range.
pub fn machine(config: Config) -> (SimMachine, Trace) {
    let trace = Trace::new();
    let machine = Machine::new(
        config,
        StepDirAxis::new(trace.pin(Line::XStep), trace.pin(Line::XDir)),
        StepDirAxis::new(trace.pin(Line::YStep), trace.pin(Line::YDir)),
        trace.pwm(1023),
        trace.clock(),
    );
    (machine, trace)
}

/// Follows a trace event by event, reconstructing where the motors went.
#[derive(Clone, Debug)]
pub struct Replay {
    axes: XY<AxisSpec>,
    dir: XY<bool>,
    pub steps: StepPositions,
    pub elapsed: Duration,
}

impl Replay {
    pub fn new(config: &Config, start: StepPositions) -> Self {
        Replay {
            axes: config.axes,
            dir: XY::new(false, false),
            steps: start,
            elapsed: Duration::ZERO,
        }
    }

    fn step_sign(axis: &AxisSpec, level: bool) -> i32 {
        if level != axis.invert_direction {
            1
        } else {
            -1
        }
    }

    /// Applies one event, returning true if it moved a motor.
    pub fn apply(&mut self, event: &Event) -> bool {
        match *event {
            Event::Level { line: Line::XDir, high } => self.dir.x = high,
            Event::Level { line: Line::YDir, high } => self.dir.y = high,
            Event::Level {
                line: Line::XStep,
                high: true,
            } => {
                self.steps.x += Self::step_sign(&self.axes.x, self.dir.x);
                return true;
            }
            Event::Level {
                line: Line::YStep,
                high: true,
            } => {
                self.steps.y += Self::step_sign(&self.axes.y, self.dir.y);
                return true;
            }
            Event::Level { .. } | Event::Duty(_) => {}
            Event::Wait(d) => self.elapsed += d,
        }
        false
    }
}
