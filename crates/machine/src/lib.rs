//! The G-code interpreter: reads commands and drives the steppers and the pen.
//!
//! Everything here runs to completion on the caller's thread. A move, once
//! started, emits all of its pulses and waits out all of its delays before
//! the next command is looked at. The only way to stop early is to run the
//! move through [`Machine::execute_cancellable`] and raise the flag from an
//! interrupt handler (or another thread).
//!
//! The hardware is reached only through `embedded-hal` traits, so the same
//! interpreter runs on a microcontroller and, with the [`sim`] module, on a
//! desktop.

#![cfg_attr(not(feature = "std"), no_std)]

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::{delay::DelayNs, digital, pwm};
use penplot_geom::{Angle, Config, Point, StepPositions};
use penplot_planner::{MoveKind, MoveRequest, Plan, Segment};
use penplot_protocol::{parse_line, Cmd, ParseError};

pub mod axis;
pub mod pen;
#[cfg(feature = "std")]
pub mod sim;

use axis::AxisDriver;
pub use pen::PenState;
use pen::Pen;

/// Everything that persists from one command to the next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MachineState {
    /// Where the last move left the head. After a move that was cancelled or
    /// failed partway, this is the step it stopped on.
    pub position: Point,
    pub pen: PenState,
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState {
            position: Point::origin(),
            pen: PenState::Up,
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("stepper output failed: {0}")]
    Pin(digital::ErrorKind),
    #[error("pen output failed: {0}")]
    Pwm(pwm::ErrorKind),
    #[error("move to {0:?} goes beyond the range of the step counters")]
    OutOfRange(Point),
    #[error("move cancelled")]
    Cancelled,
}

/// Something that supplies G-code one line at a time, like a UART.
pub trait LineSource {
    /// Returns the next complete line, or `None` if there isn't one yet.
    ///
    /// This shouldn't block for longer than it takes to check.
    fn read_line(&mut self) -> Option<&str>;
}

impl LineSource for core::str::Lines<'_> {
    fn read_line(&mut self) -> Option<&str> {
        self.next()
    }
}

/// Why a segment stopped early, and the step position it had reached.
enum Interrupted {
    Cancelled(StepPositions),
    Pin(StepPositions, digital::ErrorKind),
}

pub struct Machine<X, Y, P, D> {
    config: Config,
    x: X,
    y: Y,
    pen: Pen<P>,
    delay: D,
}

impl<X, Y, P, D> Machine<X, Y, P, D>
where
    X: AxisDriver,
    Y: AxisDriver,
    P: pwm::SetDutyCycle,
    D: DelayNs,
{
    pub fn new(config: Config, x: X, y: Y, pen: P, delay: D) -> Self {
        Machine {
            config,
            x,
            y,
            pen: Pen::new(pen, config.pen),
            delay,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn release(self) -> (X, Y, P, D) {
        (self.x, self.y, self.pen.release(), self.delay)
    }

    /// Reads at most one line from `source` and runs it.
    ///
    /// Errors are logged and otherwise ignored: a bad line never stops the
    /// machine. Returns `false` if there was no line to read.
    pub fn poll(&mut self, state: &mut MachineState, source: &mut impl LineSource) -> bool {
        let Some(line) = source.read_line() else {
            return false;
        };
        if let Err(e) = self.run_line(state, line) {
            log::warn!("{}: {e}", line.trim());
        }
        true
    }

    /// Parses and runs a single line, returning the command that ran (if the
    /// line wasn't blank).
    pub fn run_line(&mut self, state: &mut MachineState, line: &str) -> Result<Option<Cmd>, Error> {
        let Some(cmd) = parse_line(line)? else {
            return Ok(None);
        };
        self.execute(state, &cmd)?;
        Ok(Some(cmd))
    }

    pub fn execute(&mut self, state: &mut MachineState, cmd: &Cmd) -> Result<(), Error> {
        self.dispatch(state, cmd, None)
    }

    /// Like [`Machine::execute`], but a move stops as soon as it sees `cancel`
    /// set.
    ///
    /// The flag is checked before every step. After a cancelled move,
    /// `state.position` is wherever the emitted steps actually took the head.
    /// Pen changes and dwells aren't interruptible.
    pub fn execute_cancellable(
        &mut self,
        state: &mut MachineState,
        cmd: &Cmd,
        cancel: &AtomicBool,
    ) -> Result<(), Error> {
        self.dispatch(state, cmd, Some(cancel))
    }

    fn dispatch(
        &mut self,
        state: &mut MachineState,
        cmd: &Cmd,
        cancel: Option<&AtomicBool>,
    ) -> Result<(), Error> {
        log::trace!("{cmd:?}");
        let current = state.position;
        match *cmd {
            Cmd::Rapid(target) => {
                let request = MoveRequest {
                    target: target.resolve(&current),
                    kind: MoveKind::Rapid,
                };
                self.move_to(state, &request, cancel)
            }
            Cmd::Linear(target) => {
                let request = MoveRequest {
                    target: target.resolve(&current),
                    kind: MoveKind::Linear,
                };
                self.move_to(state, &request, cancel)
            }
            Cmd::Arc {
                target,
                radius,
                angle_deg,
                rotation,
            } => {
                let request = MoveRequest {
                    target: target.resolve(&current),
                    kind: MoveKind::Arc {
                        radius,
                        angle: Angle::degrees(angle_deg),
                        rotation,
                    },
                };
                self.move_to(state, &request, cancel)
            }
            Cmd::Dwell { ms } => {
                self.delay.delay_ms(ms);
                Ok(())
            }
            Cmd::PenDown => self.set_pen(state, PenState::Down),
            Cmd::PenUp => self.set_pen(state, PenState::Up),
        }
    }

    fn set_pen(&mut self, state: &mut MachineState, pen: PenState) -> Result<(), Error> {
        self.pen.set(pen, &mut self.delay).map_err(Error::Pwm)?;
        state.pen = pen;
        Ok(())
    }

    fn move_to(
        &mut self,
        state: &mut MachineState,
        request: &MoveRequest,
        cancel: Option<&AtomicBool>,
    ) -> Result<(), Error> {
        if !request.in_range(&self.config, &state.position) {
            return Err(Error::OutOfRange(request.target));
        }

        let plan = Plan::new(&self.config, &state.position, request);
        for seg in plan {
            match self.run_segment(&seg, cancel) {
                Ok(()) => {}
                Err(Interrupted::Cancelled(reached)) => {
                    state.position = self.config.steps_to_point(&reached);
                    log::info!("move cancelled at {:?}", state.position);
                    return Err(Error::Cancelled);
                }
                Err(Interrupted::Pin(reached, e)) => {
                    // The steps before the failure happened, so the position
                    // has to account for them.
                    state.position = self.config.steps_to_point(&reached);
                    log::error!("stepper output failed at {:?}: {e}", state.position);
                    return Err(Error::Pin(e));
                }
            }
        }

        // Snap to the exact requested target, not the nearest step. The next
        // move converts from this same absolute position, so the difference
        // never accumulates.
        state.position = request.target;
        Ok(())
    }

    fn run_segment(
        &mut self,
        seg: &Segment,
        cancel: Option<&AtomicBool>,
    ) -> Result<(), Interrupted> {
        let steps = seg.steps();
        let axes = self.config.axes;
        log::trace!("stepping {steps:?}");

        let mut reached = seg.from;
        if steps.x != 0 {
            self.x
                .set_direction(axes.x.direction_level(steps.x))
                .map_err(|e| Interrupted::Pin(reached, e))?;
        }
        if steps.y != 0 {
            self.y
                .set_direction(axes.y.direction_level(steps.y))
                .map_err(|e| Interrupted::Pin(reached, e))?;
        }

        // A pulse that fails is taken not to have stepped.
        let sign = steps.map(i32::signum);
        for tick in seg.iter_steps() {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(Interrupted::Cancelled(reached));
            }
            if tick.x {
                let width = axes.x.min_pulse_width_us;
                self.x
                    .pulse(width, width, &mut self.delay)
                    .map_err(|e| Interrupted::Pin(reached, e))?;
                reached.x += sign.x;
            }
            if tick.y {
                let width = axes.y.min_pulse_width_us;
                self.y
                    .pulse(width, width, &mut self.delay)
                    .map_err(|e| Interrupted::Pin(reached, e))?;
                reached.y += sign.y;
            }
            self.delay.delay_us(tick.delay_us);
        }
        Ok(())
    }
}
