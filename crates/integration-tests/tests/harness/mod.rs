//! Shared test harness: a programmatic config builder plus an in-process
//! mock upstream provider server, driving `router::Router` directly rather
//! than through an HTTP front door (no ingress surface in this workspace).

pub mod config;
pub mod mock_llm;
