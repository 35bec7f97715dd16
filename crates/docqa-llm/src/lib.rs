//! docqa-llm
//!
//! Hosted Gemini access: a shared HTTP client with timeout and error mapping,
//! and the `Generator` used for answers and query translation.
#![deny(unused_imports)]

pub mod client;
pub mod generate;

pub use client::GeminiClient;
pub use generate::GeminiGenerator;
