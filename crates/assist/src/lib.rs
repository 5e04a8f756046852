//! Client for the Generative Text Service.
//!
//! The service is an external HTTP API consumed as a black box: one request,
//! one complete text response, no streaming. Requests fail as a unit and
//! callers keep their original content on failure.

pub mod client;
pub mod config;

pub use client::{AssistClient, AssistError};
pub use config::{AssistConfig, AssistConfigError};
