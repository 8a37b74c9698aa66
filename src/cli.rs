use anyhow::{Context, Result};
use clap::Args;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::auth::{
    scope_set, AuthorizationFlow, ConsolePrompt, Credential, OAuthClient, OAuthConfig, TokenStore,
    GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI, OUT_OF_BAND_REDIRECT,
};
use crate::console;
use crate::services::DEFAULT_BASE_URL;

/// Environment variable prefix, e.g. `GSAMPLES_CLIENT__CLIENT_ID`
const ENV_PREFIX: &str = "GSAMPLES";

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

/// OAuth client registration (from the Google API console)
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

fn default_redirect_uri() -> String {
    OUT_OF_BAND_REDIRECT.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uri: default_redirect_uri(),
        }
    }
}

impl ClientConfig {
    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone().filter(|s| !s.is_empty()),
            auth_uri: self.auth_uri.clone(),
            token_uri: self.token_uri.clone(),
            redirect_uri: self.redirect_uri.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Token cache directory (defaults to ~/.google-api-samples/tokens)
    #[serde(default)]
    pub token_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

impl AppConfig {
    /// Get default config path
    /// ~/.google-api-samples/config.toml
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".google-api-samples").join("config.toml"))
    }

    /// Load configuration: defaults, then the TOML file if present, then environment
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: &Path, env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}

/// Options shared by every sample binary
#[derive(Debug, Clone, Args)]
pub struct SampleArgs {
    /// Path to configuration file (defaults to ~/.google-api-samples/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for cached tokens (overrides storage.token_dir)
    #[arg(long)]
    pub token_dir: Option<PathBuf>,

    /// Discard the cached authorization before starting
    #[arg(long)]
    pub forget: bool,
}

/// Fixed identity of a sample: where its tokens live and what it asks for
#[derive(Debug, Clone, Copy)]
pub struct SampleApp {
    pub title: &'static str,
    pub namespace: &'static str,
    /// Token cache key. It is compiled into the binary, so anyone holding the binary
    /// can decrypt the cache; the cached refresh token can be revoked at any time.
    pub application_key: &'static str,
    pub scopes: &'static [&'static str],
}

impl SampleArgs {
    pub fn load_config(&self) -> Result<AppConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => AppConfig::default_path()?,
        };
        AppConfig::load(&path)
    }

    fn token_dir(&self, config: &AppConfig) -> Result<PathBuf> {
        match self.token_dir.clone().or_else(|| config.storage.token_dir.clone()) {
            Some(dir) => Ok(dir),
            None => TokenStore::default_dir(),
        }
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the default `warn` level
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Authorize `app` with the console prompt, honoring `--forget`
pub async fn authorize(app: &SampleApp, args: &SampleArgs, config: &AppConfig) -> Result<Credential> {
    let store = TokenStore::new(args.token_dir(config)?, app.application_key);
    let scopes = scope_set(app.scopes.iter().copied());

    if args.forget {
        store.remove(app.namespace, &scopes)?;
        console::write_action("Discarded cached authorization");
    }

    let endpoint = OAuthClient::new(config.client.oauth_config())
        .context("Set client.client_id in the config file or GSAMPLES_CLIENT__CLIENT_ID")?;
    let flow = AuthorizationFlow::new(endpoint, store, ConsolePrompt);

    let credential = flow.authorize(app.namespace, &scopes).await?;
    tracing::debug!(
        "Authorized '{}' (expires at {:?})",
        app.namespace,
        credential.expires_at
    );
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env() -> Environment {
        environment().source(Some(Default::default()))
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_with_env(&dir.path().join("missing.toml"), no_env()).unwrap();

        assert!(config.client.client_id.is_empty());
        assert_eq!(config.client.auth_uri, GOOGLE_AUTH_URI);
        assert_eq!(config.client.token_uri, GOOGLE_TOKEN_URI);
        assert_eq!(config.client.redirect_uri, OUT_OF_BAND_REDIRECT);
        assert_eq!(config.services.base_url, DEFAULT_BASE_URL);
        assert!(config.storage.token_dir.is_none());
    }

    #[test]
    fn test_file_and_environment_layering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[client]
client_id = "from-file.apps.googleusercontent.com"
client_secret = "file-secret"

[storage]
token_dir = "/tmp/sample-tokens"
"#,
        )
        .unwrap();

        let env = environment().source(Some(
            [(
                "GSAMPLES_CLIENT__CLIENT_SECRET".to_string(),
                "env-secret".to_string(),
            )]
            .into_iter()
            .collect(),
        ));
        let config = AppConfig::load_with_env(&path, env).unwrap();

        assert_eq!(config.client.client_id, "from-file.apps.googleusercontent.com");
        assert_eq!(config.client.client_secret.as_deref(), Some("env-secret"));
        assert_eq!(config.storage.token_dir, Some(PathBuf::from("/tmp/sample-tokens")));
        assert_eq!(config.client.token_uri, GOOGLE_TOKEN_URI);
    }

    #[test]
    fn test_token_dir_precedence() {
        let mut config = AppConfig::default();
        config.storage.token_dir = Some(PathBuf::from("/from/config"));

        let args = SampleArgs {
            config: None,
            token_dir: Some(PathBuf::from("/from/flag")),
            forget: false,
        };
        assert_eq!(args.token_dir(&config).unwrap(), PathBuf::from("/from/flag"));

        let args = SampleArgs { token_dir: None, ..args };
        assert_eq!(args.token_dir(&config).unwrap(), PathBuf::from("/from/config"));
    }

    #[test]
    fn test_empty_client_secret_is_dropped() {
        let client = ClientConfig {
            client_id: "id".to_string(),
            client_secret: Some(String::new()),
            ..ClientConfig::default()
        };
        assert!(client.oauth_config().client_secret.is_none());
    }
}
