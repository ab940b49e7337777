/// LLM completion service client
pub mod client;
pub mod models;
pub mod prompts;

pub use client::{LlmCompletion, OpenAiClient};
pub use prompts::PromptTemplates;
