//! Trajectory move queue.
//!
//! Holds the planner's output as a contiguous timeline of
//! constant-acceleration segments, guarded by head and tail sentinel
//! entries so traversal in either direction never needs bounds checks.
//! Gaps between segments are backfilled with null moves, and retired
//! segments are kept in a bounded history for diagnostics.

use std::collections::VecDeque;

/// Timeline horizon treated as "never".
pub const NEVER_TIME: f64 = 9_999_999_999_999_999.9;

// Cap on how much idle time a gap-filling null move may cover.
const MAX_NULL_MOVE: f64 = 1.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One planned trajectory segment with constant acceleration.
///
/// `start_v` and `half_accel` describe the toolhead speed along the move;
/// `axes_r` is the unit direction vector (zero on axes that do not
/// participate, and all-zero for null moves that only hold position).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Move {
    pub print_time: f64,
    pub move_t: f64,
    pub start_v: f64,
    pub half_accel: f64,
    pub start_pos: Coord,
    pub axes_r: Coord,
}

impl Move {
    /// Distance traveled along the move at `move_time`.
    pub fn distance(&self, move_time: f64) -> f64 {
        (self.start_v + self.half_accel * move_time) * move_time
    }

    /// Toolhead speed along the move at `move_time`.
    pub fn velocity(&self, move_time: f64) -> f64 {
        self.start_v + 2.0 * self.half_accel * move_time
    }

    /// Toolhead coordinate at `move_time`.
    pub fn coord(&self, move_time: f64) -> Coord {
        let move_dist = self.distance(move_time);
        Coord {
            x: self.start_pos.x + self.axes_r.x * move_dist,
            y: self.start_pos.y + self.axes_r.y * move_dist,
            z: self.start_pos.z + self.axes_r.z * move_dist,
        }
    }

    /// Absolute print time at which the move ends.
    pub fn end_time(&self) -> f64 {
        self.print_time + self.move_t
    }
}

/// Velocity profile of one planned move, as the planner hands it over.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrapezoidProfile {
    pub accel_t: f64,
    pub cruise_t: f64,
    pub decel_t: f64,
    pub start_v: f64,
    pub cruise_v: f64,
    pub accel: f64,
}

/// Ordered timeline of planned moves for one set of steppers.
pub struct TrajectoryQueue {
    // Head and tail sentinels are always present; real moves live between
    // them. The tail sentinel is anchored at the end of the last real move
    // with an effectively infinite duration, so step generation can run
    // past the final move at its resting coordinate.
    timeline: VecDeque<Move>,
    // Retired moves, newest first.
    history: VecDeque<Move>,
}

impl Default for TrajectoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectoryQueue {
    pub fn new() -> Self {
        let mut timeline = VecDeque::new();
        timeline.push_back(Move {
            print_time: -1.0,
            ..Move::default()
        });
        timeline.push_back(Move {
            print_time: NEVER_TIME,
            move_t: NEVER_TIME,
            ..Move::default()
        });
        Self {
            timeline,
            history: VecDeque::new(),
        }
    }

    /// Assert the sentinel invariants. Corruption here is a programming
    /// error in whatever mutated the queue.
    pub fn verify_sentinels(&self) {
        let head = self.timeline.front().expect("head sentinel");
        assert!(
            head.print_time < 0.0 && head.move_t == 0.0,
            "trajectory queue head sentinel corrupted"
        );
        let tail = self.timeline.back().expect("tail sentinel");
        assert!(
            tail.move_t == NEVER_TIME,
            "trajectory queue tail sentinel corrupted"
        );
    }

    pub(crate) fn timeline(&self) -> &VecDeque<Move> {
        &self.timeline
    }

    /// Number of moves currently pending (sentinels excluded).
    pub fn pending_len(&self) -> usize {
        self.timeline.len() - 2
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Add a fully-prepared move, backfilling any timeline gap with a
    /// null move at the new move's start coordinate.
    pub fn add(&mut self, m: Move) {
        let tail_idx = self.timeline.len() - 1;
        let prev = self.timeline[tail_idx - 1];
        if prev.end_time() < m.print_time {
            let mut hold = Move {
                start_pos: m.start_pos,
                ..Move::default()
            };
            if prev.print_time <= 0.0 && m.print_time > MAX_NULL_MOVE {
                hold.print_time = m.print_time - MAX_NULL_MOVE;
            } else {
                hold.print_time = prev.end_time().max(0.0);
            }
            hold.move_t = m.print_time - hold.print_time;
            if hold.move_t > 0.0 {
                self.timeline.insert(tail_idx, hold);
            }
        }
        let at = self.timeline.len() - 1;
        self.timeline.insert(at, m);
        self.refresh_tail();
    }

    // Re-anchor the tail sentinel at the end of the last real move.
    fn refresh_tail(&mut self) {
        let n = self.timeline.len();
        let last = self.timeline[n - 2];
        let end_pos = last.coord(last.move_t);
        let tail = &mut self.timeline[n - 1];
        tail.print_time = last.end_time();
        tail.move_t = NEVER_TIME;
        tail.start_pos = end_pos;
    }

    /// Expand a trapezoid profile into up to three moves starting at
    /// `print_time`.
    pub fn append(
        &mut self,
        print_time: f64,
        profile: &TrapezoidProfile,
        start_pos: Coord,
        axes_r: Coord,
    ) {
        let mut time = print_time;
        let mut pos = start_pos;
        if profile.accel_t > 0.0 {
            let m = Move {
                print_time: time,
                move_t: profile.accel_t,
                start_v: profile.start_v,
                half_accel: 0.5 * profile.accel,
                start_pos: pos,
                axes_r,
            };
            self.add(m);
            time += profile.accel_t;
            pos = m.coord(profile.accel_t);
        }
        if profile.cruise_t > 0.0 {
            let m = Move {
                print_time: time,
                move_t: profile.cruise_t,
                start_v: profile.cruise_v,
                half_accel: 0.0,
                start_pos: pos,
                axes_r,
            };
            self.add(m);
            time += profile.cruise_t;
            pos = m.coord(profile.cruise_t);
        }
        if profile.decel_t > 0.0 {
            let m = Move {
                print_time: time,
                move_t: profile.decel_t,
                start_v: profile.cruise_v,
                half_accel: -0.5 * profile.accel,
                start_pos: pos,
                axes_r,
            };
            self.add(m);
        }
    }

    /// Retire moves that end at or before `print_time` into history, and
    /// trim history entries older than `clear_history_time`. Null moves
    /// are dropped rather than retired.
    pub fn expire(&mut self, print_time: f64, clear_history_time: f64) {
        while self.timeline.len() > 2 {
            let m = self.timeline[1];
            if m.end_time() > print_time {
                break;
            }
            let retired = self.timeline.remove(1).expect("retired move");
            if retired.start_v != 0.0 || retired.half_accel != 0.0 {
                self.history.push_front(retired);
            }
        }

        // The newest history entry is always kept as the position anchor.
        if let Some(newest) = self.history.front().copied() {
            while self.history.len() > 1 {
                let oldest = *self.history.back().expect("history entry");
                if oldest.end_time() > clear_history_time || oldest == newest {
                    break;
                }
                self.history.pop_back();
            }
        }
    }

    /// Record a position reset at `print_time`: pending moves are retired
    /// and a zero-duration marker becomes the newest history entry.
    pub fn note_position(&mut self, print_time: f64, pos: Coord) {
        self.expire(NEVER_TIME, 0.0);

        while let Some(first) = self.history.front_mut() {
            if first.print_time < print_time {
                if first.end_time() > print_time {
                    first.move_t = print_time - first.print_time;
                }
                break;
            }
            self.history.pop_front();
        }

        self.history.push_front(Move {
            print_time,
            start_pos: pos,
            ..Move::default()
        });
    }

    /// Pending and historical moves overlapping `[start_time, end_time]`,
    /// newest first, capped at `max` entries.
    pub fn history_window(&self, max: usize, start_time: f64, end_time: f64) -> Vec<Move> {
        let mut result = Vec::new();

        for i in (1..self.timeline.len() - 1).rev() {
            let m = self.timeline[i];
            if m.print_time > end_time {
                continue;
            }
            if m.end_time() < start_time || result.len() >= max {
                break;
            }
            result.push(m);
        }

        for m in &self.history {
            if m.print_time > end_time {
                continue;
            }
            if m.end_time() < start_time || result.len() >= max {
                break;
            }
            result.push(*m);
        }

        result
    }
}
