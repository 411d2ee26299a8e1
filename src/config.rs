//! Client configuration.
//!
//! The only knob the core needs is where the job executor lives. The base URL
//! is resolved from the environment (via `dotenvy`, so a `.env` file works in
//! development) and can be overridden in code.

/// Environment variable holding the executor base URL.
pub const API_BASE_ENV: &str = "BLOCKWEAVE_API_BASE";

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";

/// Where the job executor lives and how to rewrite the URLs it hands back.
///
/// `api_base` is the prefix for every job endpoint, e.g.
/// `http://host:8000/api` produces `http://host:8000/api/jobs/generate-text`.
/// Image URLs delivered host-relative (`/api/images/{id}`) are rewritten to
/// absolute addresses against the same origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    api_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_base: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Self { api_base }
    }

    /// Resolve the base URL from `BLOCKWEAVE_API_BASE`, falling back to a
    /// local development default.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let api_base =
            std::env::var(API_BASE_ENV).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self::new(api_base)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Full URL for an executor endpoint path such as `/jobs/generate-text`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Scheme + authority of the base URL, without any path component.
    #[must_use]
    pub fn origin(&self) -> String {
        let rest = match self.api_base.find("://") {
            Some(idx) => &self.api_base[idx + 3..],
            None => return self.api_base.clone(),
        };
        match rest.find('/') {
            Some(slash) => {
                let authority_end = self.api_base.len() - rest.len() + slash;
                self.api_base[..authority_end].to_string()
            }
            None => self.api_base.clone(),
        }
    }

    /// Rewrite a host-relative URL to an absolute one against the configured
    /// origin. Absolute URLs pass through unchanged.
    #[must_use]
    pub fn absolutize(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{url}", self.origin())
        } else {
            url.to_string()
        }
    }

    /// Rewrite an absolute URL under the configured origin back to a
    /// host-relative one; used when persisting the canvas document.
    #[must_use]
    pub fn relativize(&self, url: &str) -> String {
        let origin = self.origin();
        match url.strip_prefix(&origin) {
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let config = ClientConfig::new("http://localhost:8000/api//");
        assert_eq!(config.api_base(), "http://localhost:8000/api");
    }

    #[test]
    fn origin_strips_path() {
        let config = ClientConfig::new("http://localhost:8000/api");
        assert_eq!(config.origin(), "http://localhost:8000");
        let bare = ClientConfig::new("http://localhost:8000");
        assert_eq!(bare.origin(), "http://localhost:8000");
    }

    #[test]
    fn absolutize_and_relativize_roundtrip() {
        let config = ClientConfig::new("http://host:9000/api");
        let absolute = config.absolutize("/api/images/42");
        assert_eq!(absolute, "http://host:9000/api/images/42");
        assert_eq!(config.relativize(&absolute), "/api/images/42");
        // Foreign URLs pass through untouched.
        assert_eq!(
            config.relativize("https://elsewhere/img.png"),
            "https://elsewhere/img.png"
        );
    }
}
