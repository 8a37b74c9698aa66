pub mod buzz;
pub mod urlshortener;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::Credential;
use crate::error::ClientError;

/// Default root for Google JSON APIs
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// Google error envelope: `{"error": {"code": 401, "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Authorized transport shared by the service clients
#[derive(Debug, Clone)]
pub struct GoogleService {
    client: Client,
    base_url: String,
    access_token: SecretString,
}

impl GoogleService {
    pub fn new(base_url: impl Into<String>, credential: &Credential) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: credential.access_token.clone(),
        }
    }

    /// GET `{base_url}{path}` with a bearer token and decode the JSON body
    pub(crate) async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.access_token.expose_secret())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
