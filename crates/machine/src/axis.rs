use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, OutputPin, PinState};

/// A single stepped axis. It knows how to step, but not where it is.
pub trait AxisDriver {
    fn set_direction(&mut self, level_high: bool) -> Result<(), ErrorKind>;

    /// Holds the step line high for `high_us`, then low for `low_us`.
    fn pulse<D: DelayNs>(
        &mut self,
        high_us: u32,
        low_us: u32,
        delay: &mut D,
    ) -> Result<(), ErrorKind>;
}

/// A stepper driver with the usual step and direction inputs.
pub struct StepDirAxis<S, D> {
    step: S,
    dir: D,
}

impl<S: OutputPin, D: OutputPin> StepDirAxis<S, D> {
    pub fn new(step: S, dir: D) -> Self {
        Self { step, dir }
    }

    pub fn release(self) -> (S, D) {
        (self.step, self.dir)
    }
}

impl<S: OutputPin, D: OutputPin> AxisDriver for StepDirAxis<S, D> {
    fn set_direction(&mut self, level_high: bool) -> Result<(), ErrorKind> {
        self.dir
            .set_state(PinState::from(level_high))
            .map_err(|e| e.kind())
    }

    fn pulse<T: DelayNs>(
        &mut self,
        high_us: u32,
        low_us: u32,
        delay: &mut T,
    ) -> Result<(), ErrorKind> {
        self.step.set_high().map_err(|e| e.kind())?;
        delay.delay_us(high_us);
        self.step.set_low().map_err(|e| e.kind())?;
        delay.delay_us(low_us);
        Ok(())
    }
}
