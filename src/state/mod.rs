//! State module for tracking walk progress
//!
//! # Components
//!
//! - `WalkState`: the pagination walker's state machine
//! - `RateLimiter`: the shared "next request start" slot that spaces requests

mod rate_limit;
mod walk_state;

// Re-export main types
pub use rate_limit::RateLimiter;
pub use walk_state::WalkState;
