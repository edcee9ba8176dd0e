//! LLM provider layer for Skillbot.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait that all providers implement
//! - [`http_provider::HttpProvider`] — OpenAI-compatible HTTP client (Ollama by default)
//! - [`http_provider::create_provider`] — convenience builder from config

pub mod http_provider;
pub mod traits;

pub use http_provider::{create_provider, HttpProvider};
pub use traits::{LlmProvider, LlmRequestConfig};
