use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::{Error as _, ErrorKind, SetDutyCycle};
use penplot_geom::PenConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PenState {
    #[default]
    Up,
    Down,
}

/// The servo that lifts and lowers the pen.
pub struct Pen<P> {
    channel: P,
    config: PenConfig,
}

impl<P: SetDutyCycle> Pen<P> {
    pub fn new(channel: P, config: PenConfig) -> Self {
        Self { channel, config }
    }

    pub fn release(self) -> P {
        self.channel
    }

    pub fn duty_for(&self, state: PenState) -> u16 {
        let duty = match state {
            PenState::Up => self.config.up_duty,
            PenState::Down => self.config.down_duty,
        };
        duty.min(self.channel.max_duty_cycle())
    }

    /// Moves the pen and waits for the servo to get there.
    ///
    /// There's no feedback from the servo, so we always wait the full settle
    /// time, even if the pen was already in position.
    pub fn set<D: DelayNs>(&mut self, state: PenState, delay: &mut D) -> Result<(), ErrorKind> {
        let duty = self.duty_for(state);
        self.channel.set_duty_cycle(duty).map_err(|e| e.kind())?;
        delay.delay_ms(self.config.settle_ms);
        Ok(())
    }
}
