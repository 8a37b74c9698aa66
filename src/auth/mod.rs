pub mod flow;
pub mod oauth;
pub mod token_store;

pub use flow::{AuthorizationFlow, CodePrompt, ConsolePrompt};
pub use oauth::{
    OAuthClient, OAuthConfig, TokenEndpoint, GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI, OUT_OF_BAND_REDIRECT,
};
pub use token_store::{scope_set, CacheKey, Credential, ScopeSet, TokenStore};
