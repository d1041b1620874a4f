//! Analytics - handlers that look for problems in the event stream
//!
//! - `disposal_order`: lifetime scopes disposed before their children

pub mod disposal_order;

pub use disposal_order::{OutOfOrderDisposalDetector, WarnedDescriptions};
