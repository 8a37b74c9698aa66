//! Buzz activity feed client.

use serde::Deserialize;
use std::fmt;
use url::Url;

use super::GoogleService;
use crate::auth::Credential;
use crate::error::ClientError;
use crate::paging::PageResult;

/// Read-only access to Buzz activities
pub const BUZZ_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/buzz.readonly";

/// Which feed of a user to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    /// Activities the user follows
    Consumption,
    /// Activities the user posted publicly
    Public,
    /// Activities the user commented on
    Comments,
    /// Activities the user liked
    Liked,
}

impl FeedScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedScope::Consumption => "consumption",
            FeedScope::Public => "public",
            FeedScope::Comments => "comments",
            FeedScope::Liked => "liked",
        }
    }
}

impl fmt::Display for FeedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    data: ActivityFeed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityFeed {
    #[serde(default)]
    pub items: Option<Vec<Activity>>,
    #[serde(default)]
    pub links: Option<FeedLinks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedLinks {
    #[serde(default)]
    pub next: Vec<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub actor: Actor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl ActivityFeed {
    /// Continuation token: the `c` parameter of the feed's `next` link
    pub fn next_cursor(&self) -> Option<String> {
        let href = &self.links.as_ref()?.next.first()?.href;
        let url = Url::parse(href).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "c")
            .map(|(_, value)| value.into_owned())
    }

    pub fn into_page(self) -> PageResult<Activity> {
        let next_cursor = self.next_cursor();
        PageResult::new(self.items, next_cursor)
    }
}

pub struct BuzzService {
    service: GoogleService,
}

impl BuzzService {
    pub fn new(base_url: impl Into<String>, credential: &Credential) -> Self {
        Self {
            service: GoogleService::new(base_url, credential),
        }
    }

    /// Fetch one page of a user's activity feed
    pub async fn list_activities(
        &self,
        scope: FeedScope,
        user_id: &str,
        cursor: Option<String>,
    ) -> Result<PageResult<Activity>, ClientError> {
        let path = format!("/buzz/v1/activities/{}/@{}", user_id, scope);
        let mut query = vec![("alt", "json".to_string())];
        if let Some(cursor) = cursor {
            query.push(("c", cursor));
        }

        let envelope: FeedEnvelope = self.service.get_json(&path, &query).await?;
        Ok(envelope.data.into_page())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scope_set;
    use mockito::Matcher;
    use secrecy::SecretString;

    fn credential() -> Credential {
        Credential {
            access_token: SecretString::new("ya29.buzz".to_string()),
            refresh_token: SecretString::new("1//buzz".to_string()),
            scopes: scope_set([BUZZ_READONLY_SCOPE]),
            expires_at: None,
        }
    }

    #[test]
    fn test_next_cursor_from_link() {
        let feed: ActivityFeed = serde_json::from_str(
            r#"{"links": {"next": [{"href": "https://www.googleapis.com/buzz/v1/activities/@me/@consumption?c=CURSOR%3D1&alt=json"}]}}"#,
        )
        .unwrap();
        assert_eq!(feed.next_cursor().as_deref(), Some("CURSOR=1"));

        let page = feed.into_page();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor.as_deref(), Some("CURSOR=1"));
    }

    #[test]
    fn test_no_next_link() {
        let feed: ActivityFeed = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert_eq!(feed.next_cursor(), None);

        let feed: ActivityFeed =
            serde_json::from_str(r#"{"links": {"next": [{"href": "https://example.com/feed"}]}}"#).unwrap();
        assert_eq!(feed.next_cursor(), None);
    }

    #[tokio::test]
    async fn test_list_activities() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/buzz/v1/activities/@me/@consumption")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("alt".into(), "json".into()),
                Matcher::UrlEncoded("c".into(), "abc".into()),
            ]))
            .match_header("authorization", "Bearer ya29.buzz")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data": {"kind": "buzz#activityFeed", "items": [
                    {"id": "tag:1", "title": "Hello Buzz", "actor": {"id": "1", "name": "Alice"}},
                    {"id": "tag:2", "title": "Second post", "actor": {"name": "Bob"}}
                ]}}"#,
            )
            .create_async()
            .await;

        let service = BuzzService::new(server.url(), &credential());
        let page = service
            .list_activities(FeedScope::Consumption, "@me", Some("abc".to_string()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].actor.name, "Alice");
        assert_eq!(page.items[1].title, "Second post");
        assert_eq!(page.next_cursor, None);
    }
}
