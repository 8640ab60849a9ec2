//! Step-event sink boundary.
//!
//! Committed steps leave the core as `(direction, move_print_time,
//! step_time)` tuples. The MCU-facing step compression encoder lives on
//! the far side of this trait.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepSinkError {
    #[error("step queue full")]
    QueueFull,
    #[error("step at {step_time} precedes already-queued step at {last_step_time}")]
    OutOfOrder { step_time: f64, last_step_time: f64 },
}

pub type Result<T> = std::result::Result<T, StepSinkError>;

/// Downstream consumer of committed steps.
pub trait StepSink {
    /// Queue one step. `sdir` is true when the stepper advances,
    /// `step_time` is relative to `move_print_time`.
    fn append(&mut self, sdir: bool, move_print_time: f64, step_time: f64) -> Result<()>;
}

/// One committed step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepEvent {
    pub sdir: bool,
    pub move_print_time: f64,
    pub step_time: f64,
}

impl StepEvent {
    /// Absolute print time of the step.
    pub fn time(&self) -> f64 {
        self.move_print_time + self.step_time
    }
}

/// Sink that records every committed step.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<StepEvent>,
}

impl StepSink for RecordingSink {
    fn append(&mut self, sdir: bool, move_print_time: f64, step_time: f64) -> Result<()> {
        self.events.push(StepEvent {
            sdir,
            move_print_time,
            step_time,
        });
        Ok(())
    }
}
