use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// An upstream generation result annotated with source citations.
///
/// The shape is untrusted: supports may reference chunk indices that do not
/// exist, and chunks may lack a URI. Both are expected, never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub supports: Vec<Support>,
    #[serde(default)]
    pub chunks: Vec<SourceChunk>,
}

/// One cited span of the text, referencing indices into the chunk list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Support {
    #[serde(default)]
    pub chunk_indices: Vec<usize>,
}

/// One retrieved source document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceChunk {
    #[serde(default)]
    pub uri: Option<String>,
}

/// Hosts that are vendor redirectors, not real sources. Never shown.
pub const DEFAULT_DENIED_HOSTS: &[&str] = &["vertexaisearch.cloud.google.com"];

/// Turns a `GroundingResult` into display text with a trailing, deduplicated
/// bibliography. Pure: no state survives between calls, and the primary text
/// is never altered or truncated.
#[derive(Debug, Clone)]
pub struct CitationExtractor {
    denied_hosts: Vec<String>,
}

impl Default for CitationExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_DENIED_HOSTS.iter().map(|h| h.to_string()).collect())
    }
}

impl CitationExtractor {
    /// `denied_hosts` are substrings; any URI containing one is discarded.
    pub fn new(denied_hosts: Vec<String>) -> Self {
        Self { denied_hosts }
    }

    /// Append a `## Sources` section listing every cited URI, deduplicated
    /// in first-seen order. Returns the text unchanged when there is nothing
    /// to cite, and an empty string when there is no text at all.
    pub fn annotate(&self, result: &GroundingResult) -> String {
        if result.text.is_empty() {
            return String::new();
        }
        if result.supports.is_empty() || result.chunks.is_empty() {
            return result.text.clone();
        }

        let mut uris: Vec<&str> = Vec::new();
        for support in &result.supports {
            for &index in &support.chunk_indices {
                let Some(chunk) = result.chunks.get(index) else {
                    debug!(index, chunks = result.chunks.len(), "support references missing chunk");
                    continue;
                };
                let Some(uri) = chunk.uri.as_deref() else {
                    continue;
                };
                if uri.is_empty() || self.is_denied(uri) || uris.contains(&uri) {
                    continue;
                }
                uris.push(uri);
            }
        }

        if uris.is_empty() {
            return result.text.clone();
        }

        let mut text = result.text.clone();
        text.push_str("\n\n## Sources\n");
        for (n, uri) in uris.iter().enumerate() {
            text.push_str(&format!("{}. [{}]({})\n", n + 1, display_label(uri), uri));
        }
        text
    }

    fn is_denied(&self, uri: &str) -> bool {
        self.denied_hosts.iter().any(|host| uri.contains(host.as_str()))
    }
}

/// The URI's host with a leading `www.` stripped, or the raw URI when no
/// host can be extracted.
fn display_label(uri: &str) -> String {
    Url::parse(uri)
        .ok()
        .and_then(|url| {
            url.host_str()
                .map(|host| host.trim_start_matches("www.").to_string())
        })
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| uri.to_string())
}
