//! Authorization: cached refresh token first, interactive out-of-band consent otherwise.

use std::io::{self, BufRead, Write};
use url::Url;

use super::oauth::TokenEndpoint;
use super::token_store::{Credential, ScopeSet, TokenStore};
use crate::error::ClientError;

/// Number of times the user is asked for a code before a rejection becomes fatal
const MAX_CODE_ATTEMPTS: usize = 2;

/// Shows the consent URL to the user and blocks until they type in the code
pub trait CodePrompt {
    fn prompt_for_code(&self, uri: &Url) -> Result<String, ClientError>;
}

impl<F> CodePrompt for F
where
    F: Fn(&Url) -> Result<String, ClientError>,
{
    fn prompt_for_code(&self, uri: &Url) -> Result<String, ClientError> {
        self(uri)
    }
}

/// Console prompt: prints the URL to stdout and reads one line from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl CodePrompt for ConsolePrompt {
    fn prompt_for_code(&self, uri: &Url) -> Result<String, ClientError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let write_err = |e: io::Error| ClientError::AuthError(format!("Failed to write prompt: {}", e));

        writeln!(out).map_err(write_err)?;
        writeln!(out, "Please open this URL in a browser and grant access:").map_err(write_err)?;
        writeln!(out, "  {}", uri).map_err(write_err)?;
        writeln!(out).map_err(write_err)?;
        write!(out, "Authorization code: ").map_err(write_err)?;
        out.flush().map_err(write_err)?;

        let mut code = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut code)
            .map_err(|e| ClientError::AuthError(format!("Failed to read authorization code: {}", e)))?;
        if read == 0 {
            return Err(ClientError::AuthError("No authorization code entered".to_string()));
        }
        Ok(code.trim().to_string())
    }
}

/// Obtains credentials for an application namespace and scope set
pub struct AuthorizationFlow<E, P> {
    endpoint: E,
    store: TokenStore,
    prompt: P,
}

impl<E, P> AuthorizationFlow<E, P>
where
    E: TokenEndpoint,
    P: CodePrompt,
{
    pub fn new(endpoint: E, store: TokenStore, prompt: P) -> Self {
        Self { endpoint, store, prompt }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Return a valid credential, refreshing a cached one when possible and asking
    /// the user for consent otherwise.
    pub async fn authorize(&self, namespace: &str, scopes: &ScopeSet) -> Result<Credential, ClientError> {
        if let Some(cached) = self.store.get(namespace, scopes) {
            match self.endpoint.refresh(&cached).await {
                Ok(credential) => {
                    tracing::info!("Reusing cached authorization for '{}'", namespace);
                    self.save(namespace, scopes, &credential);
                    return Ok(credential);
                }
                Err(ClientError::AuthRejected(reason)) => {
                    tracing::warn!(
                        "Cached refresh token for '{}' was not accepted ({}), requesting new authorization",
                        namespace,
                        reason
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let credential = self.authorize_interactively(scopes).await?;
        self.save(namespace, scopes, &credential);
        Ok(credential)
    }

    async fn authorize_interactively(&self, scopes: &ScopeSet) -> Result<Credential, ClientError> {
        let uri = self.endpoint.authorization_url(scopes);

        let mut attempt = 1;
        loop {
            let code = self.prompt.prompt_for_code(&uri)?;
            let result = if code.trim().is_empty() {
                Err(ClientError::AuthRejected("Empty authorization code".to_string()))
            } else {
                self.endpoint.exchange_code(&code, scopes).await
            };

            match result {
                Err(ClientError::AuthRejected(reason)) if attempt < MAX_CODE_ATTEMPTS => {
                    tracing::warn!("Authorization code rejected: {}", reason);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// A failed write only costs a re-prompt next run, so it is logged, not returned.
    fn save(&self, namespace: &str, scopes: &ScopeSet, credential: &Credential) {
        if let Err(e) = self.store.put(namespace, scopes, credential) {
            tracing::warn!("{}; you will be asked to authorize again next time", e);
        }
    }
}
