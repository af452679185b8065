//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db)
//! - `datasets` - Dataset loading and listing
//! - `insights` - Insight generation and AI summaries
//! - `prompts` - Prompt library management commands
//! - `serve` - Web server command

pub mod core;
pub mod datasets;
pub mod insights;
pub mod prompts;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use datasets::*;
pub use insights::*;
pub use prompts::*;
pub use serve::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
