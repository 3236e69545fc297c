//! HTTP agent for the railbench load driver
//!
//! Every simulated user owns an [`Agent`]: a reqwest client with its own cookie
//! jar, a base URL and a cancellation token that every request races against.

pub mod agent;
pub mod config;
pub mod errors;
pub mod types;

// Re-export main types for convenience
pub use agent::{Agent, HttpResponse};
pub use config::AgentConfig;
pub use errors::HttpError;
pub use types::HttpMethod;
