//! URL shortener history client.

use serde::Deserialize;

use super::GoogleService;
use crate::auth::Credential;
use crate::error::ClientError;
use crate::paging::PageResult;

/// Manage goo.gl short URLs
pub const URLSHORTENER_SCOPE: &str = "https://www.googleapis.com/auth/urlshortener";

/// One page of the user's shortened URL history
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlHistory {
    #[serde(default)]
    pub items: Option<Vec<ShortUrl>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub items_per_page: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrl {
    /// Short URL, e.g. `http://goo.gl/fbsS`
    pub id: String,
    #[serde(default)]
    pub long_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

impl From<UrlHistory> for PageResult<ShortUrl> {
    fn from(history: UrlHistory) -> Self {
        PageResult::new(history.items, history.next_page_token)
    }
}

pub struct UrlshortenerService {
    service: GoogleService,
}

impl UrlshortenerService {
    pub fn new(base_url: impl Into<String>, credential: &Credential) -> Self {
        Self {
            service: GoogleService::new(base_url, credential),
        }
    }

    /// Fetch one page of the authenticated user's history
    pub async fn list_history(&self, start_token: Option<String>) -> Result<PageResult<ShortUrl>, ClientError> {
        let query: Vec<(&str, String)> = start_token
            .into_iter()
            .map(|token| ("start-token", token))
            .collect();

        let history: UrlHistory = self
            .service
            .get_json("/urlshortener/v1/url/history", &query)
            .await?;
        Ok(history.into())
    }
}
