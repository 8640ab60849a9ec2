// Cartesian kinematics - each stepper rides one toolhead axis

use crate::{
    generator::{ActiveFlags, PositionCurve},
    trajectory::Move,
};

/// Which toolhead axis this stepper carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Parse an axis name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

pub struct CartesianCurve {
    axis: Axis,
}

impl CartesianCurve {
    pub fn new(axis: Axis) -> Self {
        Self { axis }
    }

    pub fn active_flags(&self) -> ActiveFlags {
        match self.axis {
            Axis::X => ActiveFlags::X,
            Axis::Y => ActiveFlags::Y,
            Axis::Z => ActiveFlags::Z,
        }
    }
}

impl PositionCurve for CartesianCurve {
    fn position(&mut self, m: &Move, move_time: f64) -> f64 {
        let c = m.coord(move_time);
        match self.axis {
            Axis::X => c.x,
            Axis::Y => c.y,
            Axis::Z => c.z,
        }
    }
}
