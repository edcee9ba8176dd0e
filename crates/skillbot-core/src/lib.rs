//! skillbot-core — shared types, checkpoint persistence, conversation
//! metadata, configuration, and utilities.

pub mod checkpoint;
pub mod config;
pub mod conversations;
pub mod types;
pub mod utils;
