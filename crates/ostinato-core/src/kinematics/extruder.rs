// Extruder kinematics - filament position rides the x slot of a
// dedicated extruder queue

use crate::{
    generator::{ActiveFlags, PositionCurve},
    trajectory::Move,
};

/// Extruder stepper, optionally biased by linear pressure advance.
///
/// With pressure advance the commanded filament position leads the
/// planned one by `pa * velocity`, compensating for nozzle pressure
/// building up during fast extrusion. The bias only applies while
/// extruding forward; retractions are left untouched.
pub struct ExtruderCurve {
    pressure_advance: f64,
}

impl Default for ExtruderCurve {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtruderCurve {
    pub fn new() -> Self {
        Self {
            pressure_advance: 0.0,
        }
    }

    pub fn with_pressure_advance(pressure_advance: f64) -> Self {
        Self { pressure_advance }
    }

    pub fn set_pressure_advance(&mut self, pressure_advance: f64) {
        self.pressure_advance = pressure_advance;
    }

    pub fn active_flags(&self) -> ActiveFlags {
        ActiveFlags::X
    }
}

impl PositionCurve for ExtruderCurve {
    fn position(&mut self, m: &Move, move_time: f64) -> f64 {
        let pos = m.start_pos.x + m.axes_r.x * m.distance(move_time);
        if self.pressure_advance == 0.0 || m.axes_r.x <= 0.0 {
            return pos;
        }
        pos + self.pressure_advance * m.axes_r.x * m.velocity(move_time)
    }
}
