#[path = "resilient_llm/retry.rs"]
mod retry;

#[path = "resilient_llm/wrapper.rs"]
mod wrapper;

pub use retry::{retry_with_policy, RetryOutcome};
pub use wrapper::ResilientLLM;
