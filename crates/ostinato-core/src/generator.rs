// Iterative step-time generator for kinematic moves

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::{
    sink::{StepSink, StepSinkError},
    trajectory::{Coord, Move, TrajectoryQueue},
};

// Step/dir/step filter windows.
const SDS_CHECK_TIME: f64 = 0.001;
const SDS_FILTER_TIME: f64 = 0.000_750;

// Probe window reset after each found step.
const SEEK_TIME_RESET: f64 = 0.000_100;

// Shared numerical tolerance: seconds for times, position units for the
// reversal hysteresis.
const EPSILON: f64 = 0.000_000_001;

/// Toolhead axes that can move this stepper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveFlags {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl ActiveFlags {
    pub const NONE: Self = Self::new(false, false, false);
    pub const X: Self = Self::new(true, false, false);
    pub const Y: Self = Self::new(false, true, false);
    pub const Z: Self = Self::new(false, false, true);
    pub const XY: Self = Self::new(true, true, false);
    pub const XZ: Self = Self::new(true, false, true);
    pub const XYZ: Self = Self::new(true, true, true);

    pub const fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }
}

/// Continuous stepper position along a move.
///
/// `move_time` is relative to `m.print_time`. Implementations must be
/// deterministic and side-effect free with respect to the generator; they
/// may read any of the move fields and their own state.
pub trait PositionCurve {
    fn position(&mut self, m: &Move, move_time: f64) -> f64;
}

/// Hook invoked after each generated range, with the updated commanded
/// position.
pub trait PostMoveHook {
    fn after_move(&mut self, commanded_pos: f64);
}

impl PostMoveHook for () {
    fn after_move(&mut self, _commanded_pos: f64) {}
}

#[derive(Clone, Copy, Debug)]
struct PendingStep {
    sdir: bool,
    move_print_time: f64,
    step_time: f64,
}

// Filter for rapid "step + direction change + step" sequences. A stepper
// cannot honor a reversal while it is still settling from the previous
// step, so such pairs are dropped before they reach the sink.
#[derive(Debug, Default)]
struct SdsFilter {
    pending: Option<PendingStep>,
    // Presumed direction of the next step; survives rollbacks.
    last_dir: bool,
}

impl SdsFilter {
    // Combined gap between the pending step and a new `(mpt, st)` point.
    // The move-print component dominates between moves; summing both
    // conservatively bounds the true elapsed time.
    fn gap(pending: &PendingStep, move_print_time: f64, step_time: f64) -> f64 {
        (move_print_time - pending.move_print_time) + (step_time - pending.step_time)
    }

    fn append<S: StepSink>(
        &mut self,
        sink: &mut S,
        sdir: bool,
        move_print_time: f64,
        step_time: f64,
    ) -> Result<(), StepSinkError> {
        if let Some(pending) = self.pending {
            if sdir != pending.sdir
                && Self::gap(&pending, move_print_time, step_time) < SDS_FILTER_TIME
            {
                // The reversal and the buffered step annihilate
                debug!(move_print_time, step_time, "dropping short step reversal pair");
                self.pending = None;
                self.last_dir = sdir;
                return Ok(());
            }
            self.commit(sink)?;
        }
        self.pending = Some(PendingStep {
            sdir,
            move_print_time,
            step_time,
        });
        self.last_dir = sdir;
        Ok(())
    }

    fn commit<S: StepSink>(&mut self, sink: &mut S) -> Result<(), StepSinkError> {
        if let Some(pending) = self.pending.take() {
            sink.append(pending.sdir, pending.move_print_time, pending.step_time)?;
        }
        Ok(())
    }

    // Commit the pending step once `(mpt, st)` is far enough past it;
    // otherwise leave it buffered for the next range.
    fn flush<S: StepSink>(
        &mut self,
        sink: &mut S,
        move_print_time: f64,
        step_time: f64,
    ) -> Result<(), StepSinkError> {
        if let Some(pending) = self.pending
            && Self::gap(&pending, move_print_time, step_time) >= SDS_FILTER_TIME
        {
            return self.commit(sink);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
struct TimePos {
    time: f64,
    position: f64,
}

/// Converts planned moves into timed step events for one stepper.
///
/// The generator walks each move's position curve, emitting a step event
/// every time the curve crosses a half-step threshold, and keeps
/// `commanded_pos` (the position the stepper is centered on) within half a
/// step of the curve.
pub struct StepGenerator<C, P = ()> {
    step_dist: f64,
    commanded_pos: f64,
    last_flush_time: f64,
    last_move_time: f64,
    active_flags: ActiveFlags,
    gen_steps_pre_active: f64,
    gen_steps_post_active: f64,
    sds: SdsFilter,
    curve: C,
    post_hook: P,
}

impl<C: PositionCurve> StepGenerator<C> {
    pub fn new(step_dist: f64, active_flags: ActiveFlags, curve: C) -> Self {
        Self::with_post_hook(step_dist, active_flags, curve, ())
    }
}

impl<C: PositionCurve, P: PostMoveHook> StepGenerator<C, P> {
    pub fn with_post_hook(step_dist: f64, active_flags: ActiveFlags, curve: C, post_hook: P) -> Self {
        Self {
            step_dist,
            commanded_pos: 0.0,
            last_flush_time: 0.0,
            last_move_time: 0.0,
            active_flags,
            gen_steps_pre_active: 0.0,
            gen_steps_post_active: 0.0,
            sds: SdsFilter::default(),
            curve,
            post_hook,
        }
    }

    pub fn set_step_dist(&mut self, step_dist: f64) {
        self.step_dist = step_dist;
    }

    /// Widen the activity window: generate steps `pre_active` seconds
    /// before the stepper's moves begin and `post_active` seconds after
    /// they end. Curve layers that smooth across move boundaries need
    /// this.
    pub fn set_activity_margins(&mut self, pre_active: f64, post_active: f64) {
        self.gen_steps_pre_active = pre_active;
        self.gen_steps_post_active = post_active;
    }

    pub fn commanded_pos(&self) -> f64 {
        self.commanded_pos
    }

    pub fn curve(&self) -> &C {
        &self.curve
    }

    pub fn curve_mut(&mut self) -> &mut C {
        &mut self.curve
    }

    pub fn post_hook(&self) -> &P {
        &self.post_hook
    }

    /// Evaluate the stepper's position for a toolhead coordinate, via a
    /// stationary probe move.
    pub fn calc_position_from_coord(&mut self, x: f64, y: f64, z: f64) -> f64 {
        let probe = Move {
            move_t: 1000.0,
            start_pos: Coord::new(x, y, z),
            ..Move::default()
        };
        self.curve.position(&probe, 500.0)
    }

    /// Reset the commanded position to the given toolhead coordinate
    /// (homing, position override). Does not touch the step/dir/step
    /// buffer; the host must have drained any pending step first.
    pub fn set_position(&mut self, x: f64, y: f64, z: f64) {
        debug_assert!(
            self.sds.pending.is_none(),
            "set_position with a step still buffered"
        );
        self.commanded_pos = self.calc_position_from_coord(x, y, z);
    }

    /// Whether this stepper reacts to the given toolhead axis. Only the
    /// lowercase axis names `'x'`, `'y'`, `'z'` are recognized.
    pub fn is_active_axis(&self, axis: char) -> bool {
        match axis {
            'x' => self.active_flags.x,
            'y' => self.active_flags.y,
            'z' => self.active_flags.z,
            _ => false,
        }
    }

    // A move can only step this stepper if it drives one of its axes.
    fn move_active(&self, m: &Move) -> bool {
        (self.active_flags.x && m.axes_r.x != 0.0)
            || (self.active_flags.y && m.axes_r.y != 0.0)
            || (self.active_flags.z && m.axes_r.z != 0.0)
    }

    /// Print time of the first move in `[last flush, flush_time]` that can
    /// step this stepper, if any.
    pub fn check_active(&self, queue: &TrajectoryQueue, flush_time: f64) -> Option<f64> {
        queue.verify_sentinels();
        let timeline = queue.timeline();
        let mut idx = 0;
        while self.last_flush_time >= timeline[idx].end_time() {
            idx += 1;
        }
        loop {
            let m = &timeline[idx];
            if self.move_active(m) {
                return Some(m.print_time);
            }
            if flush_time <= m.end_time() {
                return None;
            }
            idx += 1;
        }
    }

    /// Generate step events for all moves up to `flush_time`, continuing
    /// from the previous flush cursor.
    pub fn generate_steps<S: StepSink>(
        &mut self,
        sink: &mut S,
        queue: &TrajectoryQueue,
        flush_time: f64,
    ) -> Result<(), StepSinkError> {
        let mut last_flush = self.last_flush_time;
        self.last_flush_time = flush_time;
        queue.verify_sentinels();
        trace!(last_flush, flush_time, "generating steps");
        let timeline: &VecDeque<Move> = queue.timeline();
        let mut idx = 0;
        while last_flush >= timeline[idx].end_time() {
            idx += 1;
        }
        let post_active = self.gen_steps_post_active.max(SDS_CHECK_TIME);
        let mut force_steps_time = self.last_move_time + post_active;
        loop {
            if last_flush >= flush_time {
                return Ok(());
            }
            let m = &timeline[idx];
            let mut start = m.print_time;
            let mut end = start + m.move_t;
            if start < last_flush {
                start = last_flush;
            }
            if end > flush_time {
                end = flush_time;
            }
            if self.move_active(m) {
                if self.gen_steps_pre_active > 0.0 && start > last_flush + EPSILON {
                    // Generate lead-in steps up to the activity start; the
                    // rewind stops at the head sentinel
                    force_steps_time = start;
                    if last_flush < start - self.gen_steps_pre_active {
                        last_flush = start - self.gen_steps_pre_active;
                    }
                    while idx > 0 && timeline[idx].print_time > last_flush {
                        idx -= 1;
                    }
                    continue;
                }
                self.gen_steps_range(sink, m, start, end)?;
                last_flush = end;
                self.last_move_time = end;
                force_steps_time = end + post_active;
            } else if start < force_steps_time {
                // Tail steps just past stepper activity
                if end > force_steps_time {
                    end = force_steps_time;
                }
                self.gen_steps_range(sink, m, start, end)?;
                last_flush = end;
            }
            if flush_time + self.gen_steps_pre_active <= m.end_time() {
                return Ok(());
            }
            idx += 1;
        }
    }

    // Generate step times for a portion of one move, given in absolute
    // print time.
    fn gen_steps_range<S: StepSink>(
        &mut self,
        sink: &mut S,
        m: &Move,
        abs_start: f64,
        abs_end: f64,
    ) -> Result<(), StepSinkError> {
        let half_step = 0.5 * self.step_dist;
        let start = abs_start - m.print_time;
        let end = abs_end - m.print_time;
        let mut last = TimePos {
            time: start,
            position: self.commanded_pos,
        };
        let mut low = last;
        let mut high = last;
        let mut seek_time_delta = SEEK_TIME_RESET;
        let mut sdir = self.sds.last_dir;
        let mut is_dir_change = false;
        loop {
            let diff = high.position - last.position;
            let dist = if sdir { diff } else { -diff };
            if dist >= half_step {
                // Valid upper bound - find the threshold crossing
                let target = last.position + if sdir { half_step } else { -half_step };
                let next = self.find_step(m, low, high, target);
                self.sds.append(sink, sdir, m.print_time, next.time)?;
                seek_time_delta = (next.time - last.time).max(EPSILON);
                if is_dir_change && seek_time_delta > SEEK_TIME_RESET {
                    seek_time_delta = SEEK_TIME_RESET;
                }
                is_dir_change = false;
                last.position = target + if sdir { half_step } else { -half_step };
                last.time = next.time;
                low = next;
                if low.time < high.time {
                    // The existing search range is still valid
                    continue;
                }
            } else if dist > 0.0 {
                // Stepper reaches the step position exactly - commit the
                // buffered step so a later reversal cannot roll it back
                self.sds.commit(sink)?;
            } else if dist < -(half_step + EPSILON) {
                // Found direction change
                is_dir_change = true;
                if seek_time_delta > SEEK_TIME_RESET {
                    seek_time_delta = SEEK_TIME_RESET;
                }
                if low.time > last.time {
                    // Reversal is past a found step - flip and retry
                    sdir = !sdir;
                    continue;
                }
                if high.time > last.time + EPSILON {
                    // Window too coarse - shrink the high bound toward the
                    // last step; it will become a better low bound
                    high.time = (last.time + high.time) * 0.5;
                    high.position = self.curve.position(m, high.time);
                    continue;
                }
            }
            // Extend the search window to find an upper bound
            if high.time >= end {
                break;
            }
            low = high;
            loop {
                high.time = last.time + seek_time_delta;
                seek_time_delta += seek_time_delta;
                if high.time > low.time {
                    break;
                }
            }
            if high.time > end {
                high.time = end;
            }
            high.position = self.curve.position(m, high.time);
        }
        self.sds.flush(sink, m.print_time, end)?;
        self.commanded_pos = last.position;
        self.post_hook.after_move(self.commanded_pos);
        Ok(())
    }

    // Locate the time where the curve crosses `target` inside
    // `[low, high]`, by false position on the residuals. If the bracket
    // does not straddle the target, returns the low edge as a sentinel.
    fn find_step(&mut self, m: &Move, mut low: TimePos, mut high: TimePos, target: f64) -> TimePos {
        let mut best_guess = high;
        low.position -= target;
        high.position -= target;
        if high.position == 0.0 {
            // The high bound was a perfect guess
            return best_guess;
        }
        let high_sign = high.position.is_sign_negative();
        if high_sign == low.position.is_sign_negative() {
            return TimePos {
                time: low.time,
                position: target,
            };
        }
        loop {
            let guess_time = (low.time * high.position - high.time * low.position)
                / (high.position - low.position);
            if (guess_time - best_guess.time).abs() <= EPSILON {
                break;
            }
            best_guess.time = guess_time;
            best_guess.position = self.curve.position(m, guess_time);
            let guess_dist = best_guess.position - target;
            if guess_dist.is_sign_negative() == high_sign {
                high.time = guess_time;
                high.position = guess_dist;
            } else {
                low.time = guess_time;
                low.position = guess_dist;
            }
        }
        best_guess
    }
}
