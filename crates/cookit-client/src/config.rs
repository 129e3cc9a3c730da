use thiserror::Error;
use url::Url;

/// Environment variable holding the backend project URL.
pub const ENV_URL: &str = "COOKIT_SUPABASE_URL";
/// Environment variable holding the publishable (anon) API key.
pub const ENV_ANON_KEY: &str = "COOKIT_SUPABASE_ANON_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("{0} still holds a placeholder value, set it to your project's real credentials")]
    Placeholder(&'static str),

    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Connection settings for the hosted backend. The publishable key
/// rides on every request; per-user authorization is the session's
/// bearer token.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    publishable_key: String,
}

impl ClientConfig {
    pub fn new(base_url: &str, publishable_key: &str) -> Result<Self, ConfigError> {
        if base_url.is_empty() {
            return Err(ConfigError::Missing(ENV_URL));
        }
        if publishable_key.is_empty() {
            return Err(ConfigError::Missing(ENV_ANON_KEY));
        }
        // Scaffolding templates ship "your_supabase_..." values; catch
        // them here instead of failing on the first request.
        if base_url.contains("your_supabase") {
            return Err(ConfigError::Placeholder(ENV_URL));
        }
        if publishable_key.contains("your_supabase") {
            return Err(ConfigError::Placeholder(ENV_ANON_KEY));
        }

        let parsed = Url::parse(base_url).map_err(|err| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                url: base_url.to_string(),
                reason: "missing host".into(),
            });
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var(ENV_URL).map_err(|_| ConfigError::Missing(ENV_URL))?;
        let publishable_key =
            std::env::var(ENV_ANON_KEY).map_err(|_| ConfigError::Missing(ENV_ANON_KEY))?;
        Self::new(&base_url, &publishable_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn publishable_key(&self) -> &str {
        &self.publishable_key
    }
}
