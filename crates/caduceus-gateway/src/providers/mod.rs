//! Backend implementations.
//!
//! Currently one HTTP backend speaking the OpenAI chat-completions
//! protocol, which also covers compatible gateways and proxies.

mod openai;

pub use openai::OpenAiBackend;
