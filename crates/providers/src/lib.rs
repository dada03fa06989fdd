//! LLM completion clients for Prowl.
//!
//! The only backend shipped here is the OpenAI-compatible one, which covers
//! OpenRouter, OpenAI, Ollama, vLLM, and most hosted endpoints.

mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
