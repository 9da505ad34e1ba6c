//! Motion planning: turns a move request into a stream of step segments.
//!
//! Planning is lazy. A [`Plan`] produces one [`Segment`] at a time, and each
//! segment produces one [`Tick`] at a time, so the caller can stop between
//! any two steps and nothing is ever buffered (an arc with a huge radius is
//! just a long iterator).

#![cfg_attr(not(feature = "std"), no_std)]

use penplot_geom::{Angle, Config, Point, Rotation, StepPositions};

pub mod arc;
pub mod profile;
pub mod stepper;

pub use arc::Arc;
pub use profile::VelocityProfile;
pub use stepper::{Delays, Segment, StepIter, Tick};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MoveKind {
    /// Straight line at a constant step rate.
    Rapid,
    /// Straight line with an acceleration ramp.
    Linear,
    Arc {
        radius: f32,
        angle: Angle,
        rotation: Rotation,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveRequest {
    pub target: Point,
    pub kind: MoveKind,
}

impl MoveRequest {
    /// Checks that everywhere this move can take the head, starting from
    /// `from`, is a position the step counters can hold.
    pub fn in_range(&self, config: &Config, from: &Point) -> bool {
        let fits = |p: &Point| config.checked_point_to_steps(p).is_some();
        if !fits(from) || !fits(&self.target) {
            return false;
        }
        match self.kind {
            MoveKind::Rapid | MoveKind::Linear => true,
            MoveKind::Arc {
                radius,
                angle,
                rotation,
            } => {
                let arc = Arc {
                    target: self.target,
                    radius,
                    angle,
                    rotation,
                };
                if arc.is_degenerate() {
                    return true;
                }
                // The circle passes through `from`, so none of it is more than a
                // diameter away.
                let d = 2.0 * radius;
                fits(&Point::new(from.x - d, from.y - d))
                    && fits(&Point::new(from.x + d, from.y + d))
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Waypoints {
    Direct(Option<Point>),
    Arc(arc::ArcWaypoints),
}

impl Iterator for Waypoints {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        match self {
            Waypoints::Direct(p) => p.take(),
            Waypoints::Arc(a) => a.next(),
        }
    }
}

/// The segments making up a single move.
#[derive(Clone, Debug)]
pub struct Plan {
    config: Config,
    cursor: StepPositions,
    waypoints: Waypoints,
    profiled: bool,
}

impl Plan {
    pub fn new(config: &Config, from: &Point, request: &MoveRequest) -> Self {
        let (waypoints, profiled) = match request.kind {
            MoveKind::Rapid => (Waypoints::Direct(Some(request.target)), false),
            MoveKind::Linear => (Waypoints::Direct(Some(request.target)), true),
            MoveKind::Arc {
                radius,
                angle,
                rotation,
            } => {
                let arc = Arc {
                    target: request.target,
                    radius,
                    angle,
                    rotation,
                };
                if arc.is_degenerate() {
                    log::debug!("degenerate arc (r={radius}, angle={angle:?}), moving directly");
                }
                let waypoints = arc.waypoints(from, config.axes.x.steps_per_mm);
                (Waypoints::Arc(waypoints), false)
            }
        };

        Plan {
            config: *config,
            cursor: config.point_to_steps(from),
            waypoints,
            profiled,
        }
    }

    /// Where the steps emitted so far have taken us.
    pub fn cursor(&self) -> StepPositions {
        self.cursor
    }
}

impl Iterator for Plan {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        loop {
            let to = self.config.point_to_steps(&self.waypoints.next()?);
            if to == self.cursor {
                // Waypoints closer together than a step don't need a segment.
                continue;
            }

            let mut seg = Segment {
                from: self.cursor,
                to,
                delays: Delays::Constant(self.config.rapid_delay_us()),
            };
            if self.profiled {
                seg.delays = Delays::Profile(VelocityProfile::for_config(
                    seg.dominant_steps(),
                    &self.config,
                ));
            }
            log::trace!("segment {:?} -> {:?}", seg.from, seg.to);

            self.cursor = to;
            return Some(seg);
        }
    }
}
