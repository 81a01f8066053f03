//! Folder search orchestration.
//!
//! This module provides:
//! - A cache-first search engine over the persistent file index
//! - Observer hooks for status lines and live scan progress
//! - Background sessions with pollable progress and cancellation

mod engine;
mod observer;
mod session;

// Re-export main types
pub use engine::{SearchEngine, SearchOutput};
pub use observer::{NullObserver, SearchObserver, StatusLines};
pub use session::SearchSessions;
