//! Scheduler-facing error variants (spec.md §7): thin wrappers over
//! [`router_core::CoreError`] kinds the Scheduler itself raises directly.

use router_core::CoreError;

#[must_use]
pub fn backpressure(reason: impl Into<String>) -> CoreError {
    CoreError::Backpressure(reason.into())
}

#[must_use]
pub fn unknown_model(virtual_model_id: impl Into<String>) -> CoreError {
    CoreError::UnknownModel(virtual_model_id.into())
}

#[must_use]
pub fn no_healthy_target(virtual_model_id: impl Into<String>) -> CoreError {
    CoreError::NoHealthyTarget(virtual_model_id.into())
}

#[must_use]
pub fn exhausted_targets(virtual_model_id: impl Into<String>, tried: Vec<String>) -> CoreError {
    CoreError::ExhaustedTargets(virtual_model_id.into(), tried)
}

#[must_use]
pub fn cancelled(virtual_model_id: impl Into<String>) -> CoreError {
    CoreError::Cancelled(virtual_model_id.into())
}
