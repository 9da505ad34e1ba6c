#![cfg_attr(not(feature = "std"), no_std)]

use penplot_geom::{Point, Rotation};

mod parse;

pub use parse::{parse_line, ParseError, Word};

/// The destination of a move. Axes that weren't mentioned stay where they are.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Target {
    pub x: Option<f32>,
    pub y: Option<f32>,
}

impl Target {
    pub fn new(x: f32, y: f32) -> Self {
        Target {
            x: Some(x),
            y: Some(y),
        }
    }

    pub fn resolve(&self, current: &Point) -> Point {
        Point::new(self.x.unwrap_or(current.x), self.y.unwrap_or(current.y))
    }
}

/// A single G-code command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Cmd {
    /// G0
    Rapid(Target),
    /// G1
    Linear(Target),
    /// G2 (clockwise) and G3 (counter-clockwise). The angle is the included
    /// angle of the arc, in degrees.
    Arc {
        target: Target,
        radius: f32,
        angle_deg: f32,
        rotation: Rotation,
    },
    /// G4
    Dwell { ms: u32 },
    /// M03
    PenDown,
    /// M05
    PenUp,
}

impl Cmd {
    /// The canonical spelling of this command's opcode.
    pub fn opcode(&self) -> &'static str {
        match self {
            Cmd::Rapid(_) => "G0",
            Cmd::Linear(_) => "G1",
            Cmd::Arc {
                rotation: Rotation::Clockwise,
                ..
            } => "G2",
            Cmd::Arc {
                rotation: Rotation::CounterClockwise,
                ..
            } => "G3",
            Cmd::Dwell { .. } => "G4",
            Cmd::PenDown => "M03",
            Cmd::PenUp => "M05",
        }
    }
}
