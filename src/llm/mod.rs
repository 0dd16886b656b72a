//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for the models behind the research
//! agents. Provider-specific implementations sit behind [`LLMClient`]:
//!
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`Provider`] - Runtime provider selection and client construction
//! - [`ProviderRegistry`] - Resolves named models from `lumen.toml`
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Streaming
//!
//! `stream` and `stream_with_system` return a boxed stream of text chunks; the
//! report writer forwards those chunks to the caller as they arrive.

/// Core LLM client trait and streaming response types.
pub mod client;
/// Registry for managing multiple LLM provider instances.
pub mod provider_registry;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, Provider, TextStream};
pub use provider_registry::ProviderRegistry;
