use async_trait::async_trait;
use chrono::Utc;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::token_store::{Credential, ScopeSet};
use crate::error::ClientError;

/// Redirect marker for installed applications: the consent page shows the code
/// and the user pastes it back.
pub const OUT_OF_BAND_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Capability to talk to an OAuth2 authorization server
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// URL the user opens to grant consent for `scopes`
    fn authorization_url(&self, scopes: &ScopeSet) -> Url;

    /// Exchange a user-supplied authorization code for a fresh credential
    async fn exchange_code(&self, code: &str, scopes: &ScopeSet) -> Result<Credential, ClientError>;

    /// Obtain a new access token using the credential's refresh token
    async fn refresh(&self, credential: &Credential) -> Result<Credential, ClientError>;
}

/// OAuth client registration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
}

impl OAuthConfig {
    /// Google installed-application client using the out-of-band redirect
    pub fn google(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            redirect_uri: OUT_OF_BAND_REDIRECT.to_string(),
        }
    }
}

/// [`TokenEndpoint`] backed by the `oauth2` crate
pub struct OAuthClient {
    client: BasicClient,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, ClientError> {
        if config.client_id.trim().is_empty() {
            return Err(ClientError::ConfigError("OAuth client_id is not set".to_string()));
        }

        let auth_url = AuthUrl::new(config.auth_uri.clone())
            .map_err(|e| ClientError::ConfigError(format!("Invalid auth_uri '{}': {}", config.auth_uri, e)))?;
        let token_url = TokenUrl::new(config.token_uri.clone())
            .map_err(|e| ClientError::ConfigError(format!("Invalid token_uri '{}': {}", config.token_uri, e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone()).map_err(|e| {
            ClientError::ConfigError(format!("Invalid redirect_uri '{}': {}", config.redirect_uri, e))
        })?;

        let client = BasicClient::new(
            ClientId::new(config.client_id),
            config.client_secret.map(ClientSecret::new),
            auth_url,
            Some(token_url),
        )
        // Installed-app clients send their secret in the form body
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url);

        Ok(Self { client })
    }
}

#[async_trait]
impl TokenEndpoint for OAuthClient {
    fn authorization_url(&self, scopes: &ScopeSet) -> Url {
        // The state token is meaningless for out-of-band consent; nothing redirects back.
        let (url, _state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .url();
        url
    }

    async fn exchange_code(&self, code: &str, scopes: &ScopeSet) -> Result<Credential, ClientError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.trim().to_string()))
            .request_async(async_http_client)
            .await
            .map_err(map_token_error)?;

        tracing::debug!("Authorization code exchanged for tokens");
        credential_from_response(&response, scopes, None)
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, ClientError> {
        let refresh_token = RefreshToken::new(credential.refresh_token.expose_secret().clone());
        let response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(async_http_client)
            .await
            .map_err(map_token_error)?;

        tracing::debug!("Access token refreshed");
        credential_from_response(&response, &credential.scopes, Some(&credential.refresh_token))
    }
}

/// Build a credential from a token response. Servers usually omit the refresh token
/// on refresh; the previous one stays in force then.
fn credential_from_response(
    response: &BasicTokenResponse,
    requested: &ScopeSet,
    previous_refresh: Option<&SecretString>,
) -> Result<Credential, ClientError> {
    let refresh_token = match (response.refresh_token(), previous_refresh) {
        (Some(token), _) => SecretString::new(token.secret().clone()),
        (None, Some(previous)) => previous.clone(),
        (None, None) => {
            return Err(ClientError::AuthError(
                "Token response did not include a refresh token".to_string(),
            ))
        }
    };

    let scopes = match response.scopes() {
        Some(granted) if !granted.is_empty() => granted.iter().map(|s| s.to_string()).collect(),
        _ => requested.clone(),
    };

    let expires_at = response
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .map(|d| Utc::now() + d);

    Ok(Credential {
        access_token: SecretString::new(response.access_token().secret().clone()),
        refresh_token,
        scopes,
        expires_at,
    })
}

fn map_token_error<RE>(error: RequestTokenError<RE, BasicErrorResponse>) -> ClientError
where
    RE: std::error::Error + 'static,
{
    match error {
        RequestTokenError::ServerResponse(response) => ClientError::AuthRejected(response.to_string()),
        RequestTokenError::Request(e) => ClientError::AuthError(format!("Token request failed: {}", e)),
        RequestTokenError::Parse(e, _body) => {
            ClientError::AuthError(format!("Failed to parse token response: {}", e))
        }
        RequestTokenError::Other(message) => ClientError::AuthError(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token_store::scope_set;
    use mockito::Matcher;

    const SCOPE: &str = "https://www.googleapis.com/auth/urlshortener";

    fn test_config(token_uri: String) -> OAuthConfig {
        OAuthConfig {
            token_uri,
            ..OAuthConfig::google("client-123.apps.googleusercontent.com", Some("shh".to_string()))
        }
    }

    #[test]
    fn test_authorization_url() {
        let client = OAuthClient::new(OAuthConfig::google("client-123", None)).unwrap();
        let url = client.authorization_url(&scope_set([SCOPE]));

        assert!(url.as_str().starts_with(GOOGLE_AUTH_URI));
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("client_id").map(String::as_str), Some("client-123"));
        assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(params.get("redirect_uri").map(String::as_str), Some(OUT_OF_BAND_REDIRECT));
        assert_eq!(params.get("scope").map(String::as_str), Some(SCOPE));
    }

    #[test]
    fn test_missing_client_id_is_config_error() {
        let result = OAuthClient::new(OAuthConfig::google("  ", None));
        assert!(matches!(result, Err(ClientError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "4/auth-code".into()),
                Matcher::UrlEncoded("client_secret".into(), "shh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"ya29.fresh","expires_in":3599,"refresh_token":"1//refresh","scope":"https://www.googleapis.com/auth/urlshortener","token_type":"Bearer"}"#,
            )
            .create_async()
            .await;

        let client = OAuthClient::new(test_config(format!("{}/token", server.url()))).unwrap();
        let credential = client.exchange_code(" 4/auth-code\n", &scope_set([SCOPE])).await.unwrap();

        mock.assert_async().await;
        assert_eq!(credential.access_token.expose_secret(), "ya29.fresh");
        assert_eq!(credential.refresh_token.expose_secret(), "1//refresh");
        assert_eq!(credential.scopes, scope_set([SCOPE]));
        assert!(credential.expires_at.is_some());
        assert!(!credential.needs_refresh());
    }

    #[tokio::test]
    async fn test_exchange_without_refresh_token_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.only","token_type":"Bearer"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(test_config(format!("{}/token", server.url()))).unwrap();
        let result = client.exchange_code("code", &scope_set([SCOPE])).await;
        assert!(matches!(result, Err(ClientError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_rejected_code_is_auth_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Malformed auth code."}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(test_config(format!("{}/token", server.url()))).unwrap();
        match client.exchange_code("bogus", &scope_set([SCOPE])).await {
            Err(ClientError::AuthRejected(message)) => assert!(message.contains("invalid_grant")),
            other => panic!("expected AuthRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "1//stored".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.renewed","expires_in":3600,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(test_config(format!("{}/token", server.url()))).unwrap();
        let cached = Credential {
            access_token: SecretString::new("ya29.stale".to_string()),
            refresh_token: SecretString::new("1//stored".to_string()),
            scopes: scope_set([SCOPE]),
            expires_at: Some(Utc::now() - chrono::Duration::minutes(10)),
        };

        let renewed = client.refresh(&cached).await.unwrap();
        mock.assert_async().await;
        assert_eq!(renewed.access_token.expose_secret(), "ya29.renewed");
        assert_eq!(renewed.refresh_token.expose_secret(), "1//stored");
        assert_eq!(renewed.scopes, cached.scopes);
        assert!(!renewed.is_expired());
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_is_auth_error() {
        // Nothing listens on port 9 of the loopback interface
        let client = OAuthClient::new(test_config("http://127.0.0.1:9/token".to_string())).unwrap();
        let result = client.exchange_code("code", &scope_set([SCOPE])).await;
        assert!(matches!(result, Err(ClientError::AuthError(_))));
    }
}
