use penplot_geom::Config;

/// The speed ramp of a single linear move.
///
/// Every move starts and ends at rest: nothing is carried over from one move
/// to the next. The move accelerates over its first `accel_steps` steps and
/// decelerates over its last `decel_steps`; any steps in between are taken at
/// full speed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityProfile {
    pub accel_steps: u32,
    pub decel_steps: u32,
    pub total_steps: u32,
    /// The delay between steps at full speed.
    pub base_delay_us: f32,
}

impl VelocityProfile {
    /// A triangular profile: accelerate over the first half of the steps,
    /// decelerate over the rest.
    pub fn new(total_steps: u32, base_delay_us: f32) -> Self {
        let accel_steps = total_steps / 2;
        VelocityProfile {
            accel_steps,
            decel_steps: total_steps - accel_steps,
            total_steps,
            base_delay_us,
        }
    }

    pub fn for_config(total_steps: u32, config: &Config) -> Self {
        let profile = VelocityProfile::new(total_steps, config.base_delay_us());
        match config.max_ramp_steps {
            Some(max) => profile.with_max_ramp(max),
            None => profile,
        }
    }

    /// Caps both ramps at `max_steps`, turning the triangle into a trapezoid.
    pub fn with_max_ramp(mut self, max_steps: u32) -> Self {
        self.accel_steps = self.accel_steps.min(max_steps);
        self.decel_steps = self.decel_steps.min(max_steps);
        self
    }

    /// The fraction of full speed at step `step`, always in `(0, 1]`.
    ///
    /// The first step of a move would have speed zero, which we can't
    /// divide by, so speeds are clamped below at the speed reached after
    /// one step.
    pub fn speed_factor(&self, step: u32) -> f32 {
        let min_factor = 1.0 / self.accel_steps.max(1) as f32;
        let decel_start = self.total_steps - self.decel_steps;

        let factor = if step < self.accel_steps {
            step as f32 / self.accel_steps as f32
        } else if self.decel_steps > 0 && step >= decel_start {
            self.total_steps.saturating_sub(step) as f32 / self.decel_steps as f32
        } else {
            1.0
        };
        factor.clamp(min_factor, 1.0)
    }

    pub fn delay_us(&self, step: u32) -> u32 {
        libm::roundf(self.base_delay_us / self.speed_factor(step)) as u32
    }
}
