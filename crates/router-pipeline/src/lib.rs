//! Execution pipeline for a single routed LLM request.
//!
//! A request passes through four fixed stages: [`protocol_switch`] (caller
//! wire format to/from the internal [`CompletionRequest`]/[`CompletionResponse`]
//! shapes), [`workflow`] (bridges streaming and non-streaming providers),
//! [`compatibility`] (per-provider field-path rewrites applied to wire JSON),
//! and [`provider`] (the authenticated HTTPS call itself). [`executor`] owns
//! the stage order and the retry/fallback loop around it.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod compatibility;
pub mod convert;
pub mod executor;
pub mod protocol;
pub mod protocol_switch;
pub mod provider;
pub mod types;
pub mod workflow;

pub use executor::PipelineExecutor;
pub use provider::{ProviderAdapter, ProviderCapabilities};
pub use types::{CompletionRequest, CompletionResponse, StreamEvent};
