use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::completion::{ChatRole, CompletionRequest};

/// Derives a cache key from a request.
pub type FingerprintFn = Arc<dyn Fn(&CompletionRequest) -> String + Send + Sync>;

/// SHA-256 over every field that changes what a backend would answer: the messages,
/// the model, the temperature and the token limit. Returned as lowercase hex.
///
/// Each field is length- or tag-prefixed so that different requests cannot collapse to
/// the same byte stream.
pub fn fingerprint(request: &CompletionRequest) -> String {
    let mut hasher = Sha256::new();

    hasher.update((request.messages.len() as u64).to_be_bytes());
    for message in &request.messages {
        hasher.update([role_tag(&message.role)]);
        update_str(&mut hasher, &message.content);
    }

    match &request.model {
        Some(model) => {
            hasher.update([1u8]);
            update_str(&mut hasher, model);
        }
        None => hasher.update([0u8]),
    }

    match request.temperature {
        Some(temperature) => {
            hasher.update([1u8]);
            hasher.update(temperature.to_bits().to_be_bytes());
        }
        None => hasher.update([0u8]),
    }

    match request.max_tokens {
        Some(max_tokens) => {
            hasher.update([1u8]);
            hasher.update(max_tokens.to_be_bytes());
        }
        None => hasher.update([0u8]),
    }

    hex::encode(hasher.finalize())
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn role_tag(role: &ChatRole) -> u8 {
    match role {
        ChatRole::System => 0,
        ChatRole::User => 1,
        ChatRole::Assistant => 2,
    }
}
