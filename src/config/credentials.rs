use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::HeaderValue;

use crate::error::{AuthError, Result};

/// Client credentials issued by the identity provider.
///
/// The `Authorization` header value is encoded once at construction and shared
/// by every request.
#[derive(Clone)]
pub struct ProviderCredentials {
    client_id: String,
    authorization: HeaderValue,
}

impl ProviderCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret: String = client_secret.into();
        let encoded = STANDARD.encode(format!("{client_id}:{client_secret}"));
        let mut authorization = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| AuthError::Configuration(format!("invalid client credentials: {e}")))?;
        authorization.set_sensitive(true);
        Ok(Self {
            client_id,
            authorization,
        })
    }

    /// Precomputed `Basic base64(client_id:client_secret)` header value.
    pub fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .finish()
    }
}
