// CoreXZ kinematics - the CoreXY belt arrangement tilted into the XZ plane

use crate::{
    generator::{ActiveFlags, PositionCurve},
    trajectory::Move,
};

use super::corexy::Belt;

pub struct CoreXzCurve {
    belt: Belt,
}

impl CoreXzCurve {
    pub fn new(belt: Belt) -> Self {
        Self { belt }
    }

    pub fn active_flags(&self) -> ActiveFlags {
        ActiveFlags::XZ
    }
}

impl PositionCurve for CoreXzCurve {
    fn position(&mut self, m: &Move, move_time: f64) -> f64 {
        let c = m.coord(move_time);
        match self.belt {
            Belt::A => c.x + c.z,
            Belt::B => c.x - c.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Coord;

    #[test]
    fn belts_combine_x_and_z() {
        let m = Move {
            move_t: 1.0,
            start_pos: Coord::new(10.0, 99.0, 4.0),
            ..Move::default()
        };
        assert_eq!(CoreXzCurve::new(Belt::A).position(&m, 0.5), 14.0);
        assert_eq!(CoreXzCurve::new(Belt::B).position(&m, 0.5), 6.0);
        assert_eq!(CoreXzCurve::new(Belt::A).active_flags(), ActiveFlags::XZ);
    }
}
