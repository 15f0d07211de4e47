//! Shared test utilities for jobdeck integration tests.
//!
//! - `FakeBackend`: a scripted, call-counting `JobBackend`
//! - builders for backend payloads and tracker setups

pub mod backend;
pub mod builders;

pub use backend::FakeBackend;
pub use builders::*;
