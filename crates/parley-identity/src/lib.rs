//! Caller identity verification for the Parley platform.
//!
//! Credential checks are delegated to an external OIDC-style userinfo
//! endpoint: the caller's bearer token is presented upstream and a
//! successful response yields the caller's subject. Every failure mode
//! (missing token, rejection, unreachable verifier, malformed response) is
//! surfaced as an error so the server can fail closed.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Timeout for a verification round trip.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The subject claim: the stable owner id used to scope memories.
    pub subject: String,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("credential rejected: {0}")]
    Rejected(String),

    #[error("identity service unreachable: {0}")]
    Unreachable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
}

/// Verifies bearer credentials against a userinfo endpoint.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    userinfo_url: String,
    client: reqwest::Client,
}

impl TokenVerifier {
    pub fn new(userinfo_url: impl Into<String>) -> Result<Self, IdentityError> {
        let userinfo_url = userinfo_url.into();
        if userinfo_url.trim().is_empty() {
            return Err(IdentityError::Config(
                "identity userinfo_url is not configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Config(e.to_string()))?;
        Ok(Self {
            userinfo_url,
            client,
        })
    }

    /// Verifies a bearer token and returns the caller identity.
    ///
    /// Any error here must block the request: callers map every variant
    /// to an unauthorized response rather than distinguishing causes.
    pub async fn verify(&self, token: &str) -> Result<CallerIdentity, IdentityError> {
        if token.trim().is_empty() {
            return Err(IdentityError::Rejected("empty bearer token".to_string()));
        }

        let res = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(IdentityError::Rejected(format!(
                "userinfo endpoint returned {}",
                res.status()
            )));
        }

        let info: UserInfo = res
            .json()
            .await
            .map_err(|e| IdentityError::Rejected(format!("malformed userinfo response: {}", e)))?;

        Ok(CallerIdentity { subject: info.sub })
    }
}
