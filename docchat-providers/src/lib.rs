//! Chat-completion provider for docchat
//!
//! Provides the provider abstraction and the OpenAI-compatible HTTP client
//! used to reach the hosted inference endpoint.

pub mod base;
pub mod groq;

pub use base::{
    ChatProvider, ChatResponse, ChatStreamEvent, Message, ProviderError, ProviderEventStream,
    ProviderResult,
};
pub use groq::GroqClient;
