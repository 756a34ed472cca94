//! Testing utilities and mock implementations
//!
//! Mock chat sink and scripted responders for exercising the dispatch and
//! relay pipeline without a chat platform or responder API.

pub mod mocks;

pub use mocks::*;
