//! Backend adapters.
//!
//! Real HTTP clients live with the application; the resilience layer only sees the
//! [`CompletionProvider`](crate::completion::CompletionProvider) capability.

pub mod mock;

pub use mock::{MockFailure, MockOutcome, MockProvider};
