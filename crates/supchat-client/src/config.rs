use serde::{Deserialize, Serialize};

/// Configuration surface for the chat client.
///
/// `api_root` prefixes every fallback HTTP call; it may be empty when the
/// embedding resolves relative URLs itself. `ws_url` overrides the realtime
/// origin; when absent the origin is derived from `api_root` by rewriting
/// the `http` scheme prefix to its realtime-transport equivalent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base path prefix for fallback HTTP calls, e.g.
    /// `https://support.example.com/support_chat/api`.
    #[serde(default)]
    pub api_root: String,
    /// Explicit realtime origin override, e.g. `wss://support.example.com`.
    #[serde(default)]
    pub ws_url: Option<String>,
}

impl ClientConfig {
    /// Resolves the realtime origin: the explicit override if configured,
    /// otherwise the `api_root` origin with `http`/`https` rewritten to
    /// `ws`/`wss`.
    pub fn ws_origin(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.trim_end_matches('/').to_string();
        }
        derive_ws_origin(&self.api_root)
    }

    /// Builds a fallback endpoint URL for the given path segment.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_root.trim_end_matches('/'))
    }
}

/// Rewrites the origin part of `api_root` to its realtime scheme.
/// Any path component is dropped; only scheme and authority survive.
fn derive_ws_origin(api_root: &str) -> String {
    let trimmed = api_root.trim_end_matches('/');
    let origin = match trimmed.find("://") {
        Some(scheme_end) => match trimmed[scheme_end + 3..].find('/') {
            Some(path_start) => &trimmed[..scheme_end + 3 + path_start],
            None => trimmed,
        },
        None => trimmed,
    };
    if let Some(rest) = origin.strip_prefix("https") {
        format!("wss{rest}")
    } else if let Some(rest) = origin.strip_prefix("http") {
        format!("ws{rest}")
    } else {
        origin.to_string()
    }
}
