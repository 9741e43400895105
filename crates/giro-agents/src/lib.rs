//! # giro-agents
//!
//! The reasoning side of Giro: an OpenAI-compatible chat client with tool
//! calling, the recommendation agent (search tool + item grounding), the
//! business registration agent, and the HTTP retriever.

pub mod openai;
pub mod prompts;
pub mod recommend;
pub mod register;
pub mod search;

pub use recommend::RecommendAgent;
pub use register::RegisterAgent;
pub use search::HttpRetriever;
