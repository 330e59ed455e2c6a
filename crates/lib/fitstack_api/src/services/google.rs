//! Google token verification.
//!
//! Checks a caller-supplied provider token against Google's tokeninfo
//! endpoint. Fails closed: transport errors, rejection by Google, audience
//! mismatch, and email mismatch all collapse into one `BadRequest`, so the
//! caller learns nothing about which check failed.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use fitstack_core::auth::AuthError;

/// Per-request timeout for the introspection call.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// One retry on transport failure; a rejection from Google is final.
const VERIFY_ATTEMPTS: u32 = 2;

const VERIFICATION_FAILED: &str = "Token verification failed";

/// Relevant subset of the tokeninfo response.
#[derive(Debug, Deserialize)]
pub struct TokenInfo {
    pub aud: Option<String>,
    pub azp: Option<String>,
    pub email: Option<String>,
}

/// Verifies provider tokens against the tokeninfo endpoint.
pub struct GoogleTokenVerifier {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: String) -> Self {
        Self::with_base_url(client_id, "https://www.googleapis.com".to_string())
    }

    /// Verifier against a custom endpoint (tests point this at a local
    /// mock server).
    pub fn with_base_url(client_id: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            client_id,
        }
    }

    /// Verify that the provider token is valid, was issued for this
    /// application, and proves the claimed email.
    pub async fn verify(&self, provider_token: &str, claimed_email: &str) -> Result<(), AuthError> {
        let mut attempt = 0;
        let info = loop {
            attempt += 1;
            match self.fetch_token_info(provider_token).await {
                Ok(Some(info)) => break info,
                Ok(None) => {
                    // Google rejected the token; retrying cannot help.
                    warn!("google tokeninfo rejected the token");
                    return Err(AuthError::BadRequest(VERIFICATION_FAILED.into()));
                }
                Err(e) if attempt < VERIFY_ATTEMPTS => {
                    debug!(attempt, error = %e, "tokeninfo request failed, retrying");
                }
                Err(e) => {
                    warn!(error = %e, "tokeninfo request failed");
                    return Err(AuthError::BadRequest(VERIFICATION_FAILED.into()));
                }
            }
        };

        self.check(&info, claimed_email)
    }

    /// `Ok(None)` means Google answered with a non-success status (token
    /// invalid); `Err` is a transport-level failure worth one retry.
    async fn fetch_token_info(&self, provider_token: &str) -> Result<Option<TokenInfo>, reqwest::Error> {
        let url = format!("{}/oauth2/v3/tokeninfo", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("access_token", provider_token)])
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Ok(None);
        }
        Ok(Some(resp.json::<TokenInfo>().await?))
    }

    /// Audience and email checks, shared by the live call and unit tests.
    fn check(&self, info: &TokenInfo, claimed_email: &str) -> Result<(), AuthError> {
        // Access tokens carry the application in `azp` (authorized party)
        // rather than `aud`; accept either.
        let audience_ok = info.aud.as_deref() == Some(self.client_id.as_str())
            || info.azp.as_deref() == Some(self.client_id.as_str());
        if !audience_ok {
            warn!(aud = ?info.aud, azp = ?info.azp, "google token audience mismatch");
            return Err(AuthError::BadRequest(VERIFICATION_FAILED.into()));
        }

        match info.email.as_deref() {
            Some(email) if email.eq_ignore_ascii_case(claimed_email) => Ok(()),
            other => {
                warn!(token_email = ?other, "google token email mismatch");
                Err(AuthError::BadRequest(VERIFICATION_FAILED.into()))
            }
        }
    }
}
