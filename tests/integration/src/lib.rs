//! Integration test utilities
//!
//! In-process mock REST API and gateway for end-to-end tests of the client.

pub mod fixtures;
pub mod helpers;
pub mod mock_api;
pub mod mock_gateway;

pub use fixtures::*;
pub use helpers::*;
pub use mock_api::{MessageReply, MockState};
