// Linear delta kinematics - three vertical towers with fixed-length arms

use crate::{
    generator::{ActiveFlags, PositionCurve},
    trajectory::Move,
};

/// One delta tower carriage. The carriage height for an effector at
/// `(x, y, z)` is `sqrt(arm^2 - (tx-x)^2 - (ty-y)^2) + z`.
pub struct DeltaTowerCurve {
    arm2: f64,
    tower_x: f64,
    tower_y: f64,
}

impl DeltaTowerCurve {
    pub fn new(arm_length: f64, tower_x: f64, tower_y: f64) -> Self {
        Self {
            arm2: arm_length * arm_length,
            tower_x,
            tower_y,
        }
    }

    pub fn active_flags(&self) -> ActiveFlags {
        ActiveFlags::XYZ
    }
}

impl PositionCurve for DeltaTowerCurve {
    fn position(&mut self, m: &Move, move_time: f64) -> f64 {
        let c = m.coord(move_time);
        let dx = self.tower_x - c.x;
        let dy = self.tower_y - c.y;
        (self.arm2 - dx * dx - dy * dy).sqrt() + c.z
    }
}
