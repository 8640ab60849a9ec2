// Polar kinematics - rotating bed plus a radial arm

use crate::{
    generator::{ActiveFlags, PositionCurve, PostMoveHook},
    trajectory::Move,
};

/// Which polar coordinate this stepper tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarComponent {
    Radius,
    Angle,
}

pub struct PolarCurve {
    component: PolarComponent,
}

impl PolarCurve {
    pub fn new(component: PolarComponent) -> Self {
        Self { component }
    }

    pub fn active_flags(&self) -> ActiveFlags {
        ActiveFlags::XY
    }
}

impl PositionCurve for PolarCurve {
    fn position(&mut self, m: &Move, move_time: f64) -> f64 {
        let c = m.coord(move_time);
        match self.component {
            PolarComponent::Radius => (c.x * c.x + c.y * c.y).sqrt(),
            PolarComponent::Angle => c.y.atan2(c.x),
        }
    }
}

/// Tracks the most recently commanded bed angle, so the host can unwrap
/// the atan2 discontinuity when converting back to toolhead coordinates.
#[derive(Debug, Default)]
pub struct AngleTracker {
    pub last_angle: f64,
}

impl PostMoveHook for AngleTracker {
    fn after_move(&mut self, commanded_pos: f64) {
        self.last_angle = commanded_pos;
    }
}
