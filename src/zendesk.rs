use std::fmt;

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::ServiceError,
    models::{
        Article, ArticleSearchParams, ArticleSearchResponse, CreateTicketRequest, NewTicket,
        ShowArticleResponse, Ticket, TicketResponse,
    },
};

#[async_trait]
pub trait HelpCenterApi: Send + Sync {
    async fn search_articles(
        &self,
        params: &ArticleSearchParams,
    ) -> Result<Vec<Article>, ServiceError>;

    /// `Ok(None)` when Zendesk has no such article in that locale.
    async fn show_article(
        &self,
        locale: &str,
        article_id: u64,
    ) -> Result<Option<Article>, ServiceError>;

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, ServiceError>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct ZendeskCredentials {
    pub subdomain: String,
    pub username: String,
    pub token: String,
}

impl fmt::Debug for ZendeskCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZendeskCredentials")
            .field("subdomain", &self.subdomain)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct ZendeskClient {
    base_url: Url,
    credentials: ZendeskCredentials,
    http: reqwest::Client,
}

impl ZendeskClient {
    pub fn new(base_url: &str, credentials: ZendeskCredentials) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url).map_err(|err| {
            ServiceError::InvalidConfig(format!("invalid Zendesk API URL {base_url}: {err}"))
        })?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("mcp-server-zendesk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            credentials,
            http,
        })
    }

    #[cfg(test)]
    pub fn credentials(&self) -> &ZendeskCredentials {
        &self.credentials
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::InvalidConfig(format!(
                    "Zendesk API URL cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .header(ACCEPT, "application/json")
    }
}

#[async_trait]
impl HelpCenterApi for ZendeskClient {
    async fn search_articles(
        &self,
        params: &ArticleSearchParams,
    ) -> Result<Vec<Article>, ServiceError> {
        let url = self.endpoint(&["api", "v2", "help_center", "articles", "search.json"])?;
        let response = self.request(Method::GET, url).query(params).send().await?;
        let payload: ArticleSearchResponse = decode(response).await?;
        Ok(payload.results)
    }

    async fn show_article(
        &self,
        locale: &str,
        article_id: u64,
    ) -> Result<Option<Article>, ServiceError> {
        let file = format!("{article_id}.json");
        let url = self.endpoint(&["api", "v2", "help_center", locale, "articles", &file])?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: ShowArticleResponse = decode(response).await?;
        Ok(payload.article)
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, ServiceError> {
        let url = self.endpoint(&["api", "v2", "tickets.json"])?;
        let response = self
            .request(Method::POST, url)
            .json(&CreateTicketRequest { ticket })
            .send()
            .await?;
        let payload: TicketResponse = decode(response).await?;
        Ok(payload.ticket)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Upstream {
            status: status.as_u16(),
            message: upstream_message(status, &body),
        });
    }
    Ok(response.json::<T>().await?)
}

// Error bodies are either {"error", "description"} or {"error": {"title", "message"}}.
fn upstream_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("Unexpected response")
            .to_string()
    };

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    if let Some(description) = value.get("description").and_then(Value::as_str) {
        return description.to_string();
    }

    match value.get("error") {
        Some(Value::String(error)) => error.clone(),
        Some(Value::Object(error)) => error
            .get("message")
            .or_else(|| error.get("title"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(fallback),
        _ => fallback(),
    }
}
