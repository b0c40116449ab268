//! Core vocabulary: step states and trigger rules.

mod state;
mod trigger;

pub use state::StepState;
pub use trigger::{Admission, TriggerRule};
