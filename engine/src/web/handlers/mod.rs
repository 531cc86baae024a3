//! HTTP request handlers for the admin API.
//!
//! - `common` - response envelope, query structs and error mapping
//! - `health` - liveness and queue overview
//! - `events` - event inspection, publishing and cancellation
//! - `dispatch` - manual dispatch ticks

pub mod common;
pub mod dispatch;
pub mod events;
pub mod health;

pub use dispatch::*;
pub use events::*;
pub use health::*;
