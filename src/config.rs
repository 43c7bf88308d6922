use crate::error::RelayError;

pub const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Read-only configuration snapshot, built once in `main` and shared through
/// `AppState`. Nothing reads the process environment after startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Bearer credential for the upstream provider. May be absent; its
    /// absence is reported at first use, not at load time.
    pub api_key: Option<String>,
    pub model: String,
    pub upstream_url: String,
    /// Timeout for single-shot upstream calls. The streaming path runs
    /// without one, a generation may legitimately take minutes.
    pub request_timeout_secs: u64,
}

impl RelayConfig {
    pub fn from_env(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            api_key: std::env::var("GROQ_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            upstream_url: GROQ_URL.to_string(),
            request_timeout_secs: 60,
        }
    }

    pub fn require_api_key(&self) -> Result<&str, RelayError> {
        self.api_key.as_deref().ok_or(RelayError::MissingCredential)
    }
}
