use std::{fmt, time::Duration};

use penplot_geom::{Config, Point, StepPositions, XY};
use penplot_machine::{
    sim::{self, Replay, SimMachine, Trace},
    Error, MachineState, PenState,
};
use penplot_protocol::Cmd;

/// The step positions visited during one pen-down stretch, with straight runs
/// collapsed to their endpoints.
pub type Stroke = Vec<StepPositions>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub lines: usize,
    pub commands: usize,
    pub errors: usize,
    pub steps: XY<u64>,
    pub elapsed: Duration,
    pub drawn_mm: f32,
    pub travel_mm: f32,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} lines, {} commands, {} errors",
            self.lines, self.commands, self.errors
        )?;
        writeln!(
            f,
            "drew {:.1}mm, traveled {:.1}mm with the pen up",
            self.drawn_mm, self.travel_mm
        )?;
        write!(
            f,
            "{} X steps, {} Y steps, {:.1?} of plotting",
            self.steps.x, self.steps.y, self.elapsed
        )
    }
}

/// A plotter that doesn't exist.
///
/// Commands go to a machine wired up to simulated pins. After every line, the
/// recorded pin activity is replayed to find out where the motors actually
/// went, and that (not the interpreter's idea of its position) is what ends
/// up in the strokes and statistics.
pub struct Simulator {
    config: Config,
    machine: SimMachine,
    trace: Trace,
    state: MachineState,
    replay: Replay,
    strokes: Vec<Stroke>,
    stroke: Option<Stroke>,
    stats: Stats,
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        let (machine, trace) = sim::machine(config);
        let state = MachineState::default();
        Simulator {
            config,
            machine,
            trace,
            replay: Replay::new(&config, config.point_to_steps(&state.position)),
            state,
            strokes: Vec::new(),
            stroke: None,
            stats: Stats::default(),
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Where the replayed motors are.
    pub fn motor_position(&self) -> Point {
        self.config.steps_to_point(&self.replay.steps)
    }

    pub fn run_line(&mut self, line: &str) -> Result<Option<Cmd>, Error> {
        self.stats.lines += 1;
        let ret = self.machine.run_line(&mut self.state, line);
        match &ret {
            Ok(Some(_)) => self.stats.commands += 1,
            Ok(None) => {}
            Err(_) => self.stats.errors += 1,
        }

        // A single line never both moves and changes the pen, so the pen state
        // after the line is the one its steps were taken with.
        self.absorb_trace();
        if self.state.pen == PenState::Up {
            self.finish_stroke();
        }
        ret
    }

    fn absorb_trace(&mut self) {
        let pen_down = self.state.pen == PenState::Down;
        for event in self.trace.take() {
            let before = self.replay.steps;
            if !self.replay.apply(&event) {
                continue;
            }
            let after = self.replay.steps;

            let delta = before.delta_to(&after);
            self.stats.steps.x += u64::from(delta.x.unsigned_abs());
            self.stats.steps.y += u64::from(delta.y.unsigned_abs());

            let dist = self
                .config
                .steps_to_point(&before)
                .distance_to(self.config.steps_to_point(&after));
            if pen_down {
                self.stats.drawn_mm += dist;
                let stroke = self.stroke.get_or_insert_with(|| vec![before]);
                extend_stroke(stroke, after);
            } else {
                self.stats.travel_mm += dist;
            }
        }
        self.stats.elapsed = self.replay.elapsed;
    }

    fn finish_stroke(&mut self) {
        if let Some(stroke) = self.stroke.take() {
            if stroke.len() >= 2 {
                self.strokes.push(stroke);
            }
        }
    }

    /// Stops the simulation, returning the statistics and everything that was
    /// drawn.
    pub fn finish(mut self) -> (Stats, Vec<Stroke>) {
        self.finish_stroke();
        (self.stats, self.strokes)
    }
}

fn extend_stroke(stroke: &mut Stroke, p: StepPositions) {
    if let [.., a, b] = stroke.as_slice() {
        let ab = a.delta_to(b);
        let bp = b.delta_to(&p);
        let cross = i64::from(ab.x) * i64::from(bp.y) - i64::from(ab.y) * i64::from(bp.x);
        let dot = i64::from(ab.x) * i64::from(bp.x) + i64::from(ab.y) * i64::from(bp.y);
        if cross == 0 && dot > 0 {
            if let Some(last) = stroke.last_mut() {
                *last = p;
            }
            return;
        }
    }
    stroke.push(p);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(program: &str) -> Simulator {
        let mut sim = Simulator::new(Config::default());
        for line in program.lines() {
            let _ = sim.run_line(line);
        }
        sim
    }

    #[test]
    fn square() {
        let sim = simulate("M03\nG1 X10 Y0\nG1 X10 Y10\nG1 X0 Y10\nG1 X0 Y0\nM05");
        let (stats, strokes) = sim.finish();

        assert_eq!(
            strokes,
            vec![vec![
                XY::new(0, 0),
                XY::new(200, 0),
                XY::new(200, 200),
                XY::new(0, 200),
                XY::new(0, 0),
            ]]
        );
        assert_eq!(stats.commands, 6);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.steps, XY::new(400, 400));
        assert!((stats.drawn_mm - 40.0).abs() < 1e-3);
        assert_eq!(stats.travel_mm, 0.0);
    }

    #[test]
    fn pen_up_moves_are_travel() {
        let sim = simulate("G0 X5 Y0\nM03\nG1 X5 Y2\nM05\nG0 X0 Y0\nM03\nG1 X1 Y0");
        assert!((sim.stats().travel_mm - 10.0).abs() < 1e-3);
        assert!((sim.stats().drawn_mm - 3.0).abs() < 1e-3);

        // The last stroke is still open until the simulation finishes.
        let (_, strokes) = sim.finish();
        assert_eq!(
            strokes,
            vec![
                vec![XY::new(100, 0), XY::new(100, 40)],
                vec![XY::new(0, 0), XY::new(20, 0)],
            ]
        );
    }

    #[test]
    fn errors_are_counted() {
        let sim = simulate("G1 XABC Y0\nG28\n\nG0 X1 Y1");
        let stats = sim.stats();
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.commands, 1);
        assert_eq!(sim.motor_position(), Point::new(1.0, 1.0));
    }

    #[test]
    fn replay_agrees_with_interpreter() {
        let sim = simulate("G0 X3 Y4\nM03\nG2 X10 Y4 R3.5 A180\nG3 X-2.25 Y7.15 R6 A300\nG1 X0.05 Y0.05");
        let config = Config::default();
        assert_eq!(
            config.point_to_steps(&sim.motor_position()),
            config.point_to_steps(&sim.state().position)
        );
        assert_eq!(sim.state().position, Point::new(0.05, 0.05));
    }

    #[test]
    fn elapsed_time() {
        let sim = simulate("M03\nG4 P250\nM05");
        assert_eq!(sim.stats().elapsed, Duration::from_millis(1250));
    }

    #[test]
    fn collinear_steps_merge() {
        let mut stroke = vec![XY::new(0, 0)];
        for p in [XY::new(1, 1), XY::new(2, 2), XY::new(3, 2), XY::new(2, 2)] {
            extend_stroke(&mut stroke, p);
        }
        // Doubling back is not a straight run.
        assert_eq!(
            stroke,
            vec![XY::new(0, 0), XY::new(2, 2), XY::new(3, 2), XY::new(2, 2)]
        );
    }
}
