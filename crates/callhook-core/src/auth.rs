//! OAuth2 access tokens for the cloud APIs.
//!
//! A static token from config/env wins. Otherwise the token comes from the
//! compute metadata server and is cached until shortly before it expires.
//! Emulator setups run anonymous.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::AuthConfig;
use crate::error::{CallhookError, Result};

/// Refresh this long before the reported expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Where bearer tokens come from.
pub enum TokenSource {
    /// No `Authorization` header at all.
    Anonymous,
    Static(String),
    Metadata(MetadataTokenSource),
}

impl TokenSource {
    /// Pick a source from config. `anonymous_fallback` is set when talking to an
    /// emulator, where no credentials exist.
    pub fn from_config(auth: &AuthConfig, anonymous_fallback: bool) -> Self {
        if !auth.access_token.is_empty() {
            TokenSource::Static(auth.access_token.clone())
        } else if anonymous_fallback {
            TokenSource::Anonymous
        } else {
            TokenSource::Metadata(MetadataTokenSource::new(&auth.metadata_url))
        }
    }

    /// Current bearer token, or None when anonymous.
    pub async fn token(&self) -> Result<Option<String>> {
        match self {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Metadata(source) => source.token().await.map(Some),
        }
    }

    /// Attach the bearer header to a request, if there is a token.
    pub async fn authorize(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(match self.token().await? {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Token fetched from the metadata server, cached.
pub struct MetadataTokenSource {
    url: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

impl MetadataTokenSource {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(tok) = cached.as_ref()
            && Utc::now() < tok.expires_at
        {
            return Ok(tok.value.clone());
        }

        let resp = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| CallhookError::Auth(format!("Metadata server unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(CallhookError::Auth(format!("Metadata server returned {status}")));
        }

        let body: MetadataTokenResponse = resp
            .json()
            .await
            .map_err(|e| CallhookError::Auth(format!("Invalid metadata token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(body.expires_in - REFRESH_MARGIN_SECS);
        tracing::debug!("🔑 Access token refreshed (expires {})", expires_at.format("%H:%M:%S UTC"));
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at,
        });
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_wins() {
        let auth = AuthConfig {
            access_token: "ya29.static".into(),
            ..AuthConfig::default()
        };
        let source = TokenSource::from_config(&auth, true);
        assert_eq!(source.token().await.unwrap().as_deref(), Some("ya29.static"));
    }

    #[tokio::test]
    async fn test_anonymous_fallback() {
        let source = TokenSource::from_config(&AuthConfig::default(), true);
        assert!(source.token().await.unwrap().is_none());
    }

    #[test]
    fn test_metadata_by_default() {
        let source = TokenSource::from_config(&AuthConfig::default(), false);
        assert!(matches!(source, TokenSource::Metadata(_)));
    }
}
