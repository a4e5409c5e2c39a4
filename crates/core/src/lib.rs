//! Core library for the A2ABase client SDK
//!
//! This crate contains the domain types shared by the client:
//! - Errors and configuration (credential, base URL, timeouts)
//! - Tool identifiers
//! - Agent, Thread and Run records
//! - Stream events and the run state machine

pub mod agent;
pub mod config;
mod de;
pub mod error;
pub mod run;
pub mod thread;
pub mod tool;

pub use config::{ApiKey, ClientConfig, RetryPolicy};
pub use error::{Error, TimeoutKind};
pub type Result<T> = std::result::Result<T, Error>;
