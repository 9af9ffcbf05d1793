//! HTTP implementation of [`IdentityProvider`] over reqwest.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{AuthenticatedUser, FailureReason, IdentityProvider, PollOutcome, QrChallenge};
use crate::config::{AuthConfig, ProviderCredentials};
use crate::error::AuthError;

/// Field names the provider may use for the user token in a success payload.
const TOKEN_FIELDS: &[&str] = &["token", "userToken", "accessToken"];

/// Provider client that talks to the identity provider's auth and polling endpoints.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use swift_qr_auth::config::AuthConfig;
/// use swift_qr_auth::provider::{HttpIdentityProvider, IdentityProvider};
///
/// # async fn example() -> swift_qr_auth::error::Result<()> {
/// let config = AuthConfig::builder()
///     .client_id("my-app")
///     .client_secret("s3cret")
///     .callback_url("https://app.example.com/cb")
///     .auth_url("https://id.example.com/auth")
///     .polling_url("https://id.example.com/poll")
///     .attempt_lifetime(Duration::from_secs(120))
///     .build();
/// let provider = HttpIdentityProvider::new(&config)?;
/// let challenge = provider.initiate(&config.client_id, &config.callback_url).await?;
/// println!("{}", challenge.qr_payload);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    credentials: ProviderCredentials,
    auth_url: String,
    polling_url: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            credentials: config.credentials()?,
            auth_url: config.auth_url.clone(),
            polling_url: config.polling_url.clone(),
        })
    }

    async fn fetch_status(&self, correlation_id: &str) -> Result<PollOutcome, AuthError> {
        let resp = self
            .client
            .get(&self.polling_url)
            .query(&[("uniqueId", correlation_id)])
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.credentials.authorization().clone())
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AuthError::rejected(status.as_u16(), body));
        }
        parse_status_body(&body)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn initiate(
        &self,
        client_id: &str,
        callback_url: &str,
    ) -> Result<QrChallenge, AuthError> {
        let resp = self
            .client
            .post(&self.auth_url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.credentials.authorization().clone())
            .json(&InitiateRequest {
                client_id,
                callback_url,
            })
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "QR challenge request rejected");
            return Err(AuthError::rejected(status.as_u16(), body));
        }
        let payload: InitiateResponse = serde_json::from_str(&body)?;
        let qr_payload = non_empty(payload.qr_code)
            .ok_or_else(|| AuthError::MalformedResponse("response lacks qrCode".to_string()))?;
        let correlation_id = non_empty(payload.unique_id)
            .ok_or_else(|| AuthError::MalformedResponse("response lacks uniqueId".to_string()))?;
        tracing::debug!(correlation_id = %correlation_id, "QR challenge issued");
        Ok(QrChallenge {
            qr_payload,
            correlation_id,
        })
    }

    async fn check_status(&self, correlation_id: &str) -> PollOutcome {
        match self.fetch_status(correlation_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(correlation_id, error = %err, "status check failed");
                PollOutcome::Failed(FailureReason::from(err))
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateRequest<'a> {
    client_id: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateResponse {
    qr_code: Option<String>,
    unique_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Interpret a status body: `{success: true, ...}` authenticates,
/// `{success: false, error: "..."}` is a final denial, bare `{success: false}`
/// is still waiting.
fn parse_status_body(body: &str) -> Result<PollOutcome, AuthError> {
    let mut fields: Map<String, Value> = serde_json::from_str(body)?;
    let success = fields
        .remove("success")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| {
            AuthError::MalformedResponse("status response lacks boolean success".to_string())
        })?;

    if !success {
        let reason = fields
            .get("error")
            .and_then(Value::as_str)
            .filter(|reason| !reason.trim().is_empty());
        return Ok(match reason {
            Some(reason) => PollOutcome::Failed(FailureReason::Denied(reason.to_string())),
            None => PollOutcome::Pending,
        });
    }

    let token = TOKEN_FIELDS.iter().find_map(|key| match fields.get(*key) {
        Some(Value::String(token)) => Some((*key, token.clone())),
        _ => None,
    });
    let token = token.map(|(key, token)| {
        fields.remove(key);
        token
    });
    Ok(PollOutcome::Authenticated(AuthenticatedUser {
        token,
        profile: fields,
    }))
}
