use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What is being asked about an entity. One cache key exists per
/// (entity, kind) pair, so each kind is generated at most once per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Company overview and track record.
    Profile,
    /// Recent news digest.
    News,
    /// Free-form follow-up question.
    Chat,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Profile => "profile",
            RequestKind::News => "news",
            RequestKind::Chat => "chat",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key for a (subject, kind) pair. Stable within a run; unique per
/// subject and kind.
pub fn request_key(entity_id: &str, kind: RequestKind) -> String {
    format!("{entity_id}:{kind}")
}

/// Cache key for one chat turn: free-text questions are fingerprinted so
/// equivalent repeats coalesce without the key growing unbounded.
pub fn chat_key(entity_id: &str, question: &str) -> String {
    format!("{entity_id}:{}:{}", RequestKind::Chat, fingerprint(question))
}

/// sha256 hex digest of `text`.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keys_are_stable_and_distinct() {
        assert_eq!(request_key("acme", RequestKind::Profile), "acme:profile");
        assert_ne!(
            request_key("acme", RequestKind::Profile),
            request_key("acme", RequestKind::News)
        );
    }

    #[test]
    fn chat_keys_differ_by_question() {
        let a = chat_key("acme", "what do they invest in?");
        let b = chat_key("acme", "who founded them?");
        assert_ne!(a, b);
        assert_eq!(a, chat_key("acme", "what do they invest in?"));
        assert!(a.starts_with("acme:chat:"));
    }

    #[test]
    fn fingerprints_are_hex_sha256() {
        let digest = fingerprint("hello");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
