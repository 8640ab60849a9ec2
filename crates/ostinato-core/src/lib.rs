//! Step timing core for stepper motion control.
//!
//! Converts a queue of planned trajectory moves into an ordered stream of
//! precisely timed step events for one stepper, keeping the stepper's
//! discrete position within half a step of its continuous target. This
//! crate stops at the step-event sink boundary; transport- and
//! MCU-specific layers live elsewhere.

pub mod generator;
pub mod kinematics;
pub mod sink;
pub mod trajectory;
