//! Server module for Switchboard
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `hooks`: HTTP endpoints (health, event hooks)
//! - `interactions`: Default Telegram interaction handler
//! - `init`: Store/adapter setup and the run loop

pub mod config;
mod hooks;
mod init;
mod interactions;
mod loader;

// Re-export public API
pub use init::{build_runtime, run};
pub use loader::load_config;
