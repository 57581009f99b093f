//! Domain layer types and invariants.

pub mod forms;
pub mod viewer;
