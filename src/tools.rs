use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::{
    client_factory::ClientFactory,
    context::current_scope,
    error::ServiceError,
    identity::requester_email_for_ticket,
    models::{
        Article, ArticleSearchParams, NewTicket, TicketComment, TicketPriority, TicketRequester,
        TicketType,
    },
};

pub const SEARCH_ARTICLES: &str = "search_articles";
pub const GET_ARTICLE_CONTENT: &str = "get_article_content";
pub const CREATE_TICKET: &str = "create_ticket";

pub const DEFAULT_SEARCH_LOCALE: &str = "ja-jp";
pub const DEFAULT_ARTICLE_LOCALE: &str = "ja";
const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolResultEnvelope {
    Success(Map<String, Value>),
    Failure(String),
}

impl ToolResultEnvelope {
    fn success<T: Serialize>(payload: &T) -> Result<Self, ServiceError> {
        match serde_json::to_value(payload)? {
            Value::Object(map) => Ok(Self::Success(map)),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                Ok(Self::Success(map))
            }
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Success(payload) => {
                let mut map = payload.clone();
                map.insert("success".to_string(), Value::Bool(true));
                Value::Object(map)
            }
            Self::Failure(message) => json!({ "success": false, "error": message }),
        }
    }

    pub fn to_call_result(&self) -> Value {
        let text = serde_json::to_string_pretty(&self.to_value())
            .unwrap_or_else(|_| r#"{"success":false,"error":"Failed to encode tool result"}"#.to_string());
        json!({
            "content": [
                { "type": "text", "text": text }
            ]
        })
    }
}

pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": SEARCH_ARTICLES,
            "description": "Search for public articles in Zendesk Help Center",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query for articles" },
                    "locale": { "type": "string", "description": "Locale for articles", "default": DEFAULT_SEARCH_LOCALE },
                    "per_page": { "type": "integer", "description": "Number of results per page", "default": DEFAULT_PER_PAGE, "minimum": 1, "maximum": MAX_PER_PAGE },
                    "page": { "type": "integer", "description": "Page number", "default": 1, "minimum": 1 }
                },
                "required": ["query"]
            }
        }),
        json!({
            "name": GET_ARTICLE_CONTENT,
            "description": "Get the full content of a specific article from Zendesk Help Center",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "article_id": { "type": "integer", "description": "The ID of the article to retrieve", "minimum": 0 },
                    "locale": { "type": "string", "description": "Locale for the article", "default": DEFAULT_ARTICLE_LOCALE }
                },
                "required": ["article_id"]
            }
        }),
        json!({
            "name": CREATE_TICKET,
            "description": "Create a new support ticket in Zendesk",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "subject": { "type": "string", "description": "Subject of the ticket" },
                    "comment": {
                        "type": "object",
                        "properties": {
                            "body": { "type": "string", "description": "Initial comment body" }
                        },
                        "required": ["body"]
                    },
                    "requester": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "description": "Requester name" },
                            "email": { "type": "string", "description": "Requester email" }
                        }
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["urgent", "high", "normal", "low"],
                        "description": "Ticket priority",
                        "default": "normal"
                    },
                    "type": {
                        "type": "string",
                        "enum": ["problem", "incident", "question", "task"],
                        "description": "Ticket type"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Tags to add to the ticket"
                    }
                },
                "required": ["subject", "comment"]
            }
        }),
    ]
}

pub async fn call_tool(
    factory: &dyn ClientFactory,
    name: &str,
    args: Value,
) -> Option<ToolResultEnvelope> {
    let envelope = match name {
        SEARCH_ARTICLES => search_articles(factory, args).await,
        GET_ARTICLE_CONTENT => get_article_content(factory, args).await,
        CREATE_TICKET => create_ticket(factory, args).await,
        _ => return None,
    };
    Some(envelope)
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ServiceError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|err| ServiceError::invalid_arguments(err.to_string()))
}

fn failed(tool: &str, err: ServiceError) -> ToolResultEnvelope {
    match current_scope() {
        Ok(scope) => error!(parent: scope.logger(), tool, error = %err, "Tool call failed"),
        Err(_) => error!(tool, error = %err, "Tool call failed"),
    }
    ToolResultEnvelope::failure(err.to_string())
}

// search_articles

#[derive(Debug, Deserialize)]
struct SearchArticlesArgs {
    query: String,
    #[serde(default = "default_search_locale")]
    locale: String,
    #[serde(default = "default_per_page")]
    per_page: u32,
    #[serde(default = "default_page")]
    page: u32,
}

fn default_search_locale() -> String {
    DEFAULT_SEARCH_LOCALE.to_string()
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Serialize)]
struct ArticleSummary {
    id: Option<u64>,
    title: Option<String>,
    url: Option<String>,
    body: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<Article> for ArticleSummary {
    fn from(article: Article) -> Self {
        Self {
            body: body_preview(article.body.as_deref()),
            id: article.id,
            title: article.title,
            url: article.html_url,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchArticlesResult {
    count: usize,
    page: u32,
    per_page: u32,
    articles: Vec<ArticleSummary>,
}

fn body_preview(body: Option<&str>) -> String {
    let Some(body) = body else {
        return String::new();
    };
    match body.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

pub async fn search_articles(factory: &dyn ClientFactory, args: Value) -> ToolResultEnvelope {
    match run_search_articles(factory, args).await {
        Ok(envelope) => envelope,
        Err(err) => failed(SEARCH_ARTICLES, err),
    }
}

async fn run_search_articles(
    factory: &dyn ClientFactory,
    args: Value,
) -> Result<ToolResultEnvelope, ServiceError> {
    let args: SearchArticlesArgs = parse_args(args)?;
    if args.query.trim().is_empty() {
        return Err(ServiceError::invalid_arguments("query must not be empty"));
    }
    if !(1..=MAX_PER_PAGE).contains(&args.per_page) {
        return Err(ServiceError::invalid_arguments(format!(
            "per_page must be between 1 and {MAX_PER_PAGE}"
        )));
    }
    if args.page == 0 {
        return Err(ServiceError::invalid_arguments("page must be at least 1"));
    }

    let scope = current_scope()?;
    let log = scope.logger();
    let client = factory.create_client(scope.identity())?;

    info!(
        parent: log,
        query = %args.query,
        locale = %args.locale,
        per_page = args.per_page,
        page = args.page,
        "Searching Zendesk articles"
    );

    let params = ArticleSearchParams {
        query: args.query,
        locale: args.locale,
        per_page: args.per_page,
        page: args.page,
    };
    let articles = client
        .search_articles(&params)
        .await?
        .into_iter()
        .map(ArticleSummary::from)
        .collect::<Vec<_>>();

    info!(parent: log, count = articles.len(), "Zendesk article search completed");

    ToolResultEnvelope::success(&SearchArticlesResult {
        count: articles.len(),
        page: params.page,
        per_page: params.per_page,
        articles,
    })
}

// get_article_content

#[derive(Debug, Deserialize)]
struct GetArticleContentArgs {
    article_id: u64,
    #[serde(default)]
    locale: Option<String>,
}

#[derive(Debug, Serialize)]
struct ArticleContent {
    id: Option<u64>,
    title: Option<String>,
    url: Option<String>,
    body: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    author_id: Option<u64>,
    section_id: Option<u64>,
    promoted: Option<bool>,
    position: Option<i64>,
    label_names: Option<Vec<String>>,
    locale: Option<String>,
}

impl From<Article> for ArticleContent {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            url: article.html_url.or(article.url),
            body: article.body,
            created_at: article.created_at,
            updated_at: article.updated_at,
            author_id: article.author_id,
            section_id: article.section_id,
            promoted: article.promoted,
            position: article.position,
            label_names: article.label_names,
            locale: article.locale,
        }
    }
}

#[derive(Debug, Serialize)]
struct GetArticleContentResult {
    article: ArticleContent,
}

pub async fn get_article_content(factory: &dyn ClientFactory, args: Value) -> ToolResultEnvelope {
    match run_get_article_content(factory, args).await {
        Ok(envelope) => envelope,
        Err(err) => failed(GET_ARTICLE_CONTENT, err),
    }
}

async fn run_get_article_content(
    factory: &dyn ClientFactory,
    args: Value,
) -> Result<ToolResultEnvelope, ServiceError> {
    let args: GetArticleContentArgs = parse_args(args)?;
    let locale = args
        .locale
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_ARTICLE_LOCALE.to_string());

    let scope = current_scope()?;
    let log = scope.logger();
    let client = factory.create_client(scope.identity())?;

    info!(
        parent: log,
        article_id = args.article_id,
        locale = %locale,
        "Retrieving Zendesk article content"
    );

    let article = match client.show_article(&locale, args.article_id).await? {
        Some(article) if article.id.is_some() => article,
        _ => return Err(ServiceError::ArticleNotFound),
    };

    info!(
        parent: log,
        article_id = args.article_id,
        title = article.title.as_deref().unwrap_or_default(),
        "Zendesk article content retrieved"
    );

    ToolResultEnvelope::success(&GetArticleContentResult {
        article: ArticleContent::from(article),
    })
}

// create_ticket

#[derive(Debug, Deserialize)]
struct CreateTicketArgs {
    subject: String,
    comment: TicketComment,
    #[serde(default)]
    requester: Option<TicketRequester>,
    #[serde(default)]
    priority: TicketPriority,
    #[serde(default, rename = "type")]
    ticket_type: Option<TicketType>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct CreatedTicket {
    id: u64,
    url: Option<String>,
    subject: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    #[serde(rename = "type")]
    ticket_type: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requester_email: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateTicketResult {
    ticket: CreatedTicket,
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

pub async fn create_ticket(factory: &dyn ClientFactory, args: Value) -> ToolResultEnvelope {
    match run_create_ticket(factory, args).await {
        Ok(envelope) => envelope,
        Err(err) => failed(CREATE_TICKET, err),
    }
}

async fn run_create_ticket(
    factory: &dyn ClientFactory,
    args: Value,
) -> Result<ToolResultEnvelope, ServiceError> {
    let args: CreateTicketArgs = parse_args(args)?;
    if args.subject.trim().is_empty() {
        return Err(ServiceError::invalid_arguments("subject must not be empty"));
    }
    let explicit_email = args
        .requester
        .as_ref()
        .and_then(|r| r.email.as_deref())
        .filter(|email| !email.is_empty());
    if let Some(email) = explicit_email {
        if !is_valid_email(email) {
            return Err(ServiceError::invalid_arguments(
                "requester.email must be a valid email address",
            ));
        }
    }

    let scope = current_scope()?;
    let log = scope.logger();
    let client = factory.create_client(scope.identity())?;

    let requester_email = requester_email_for_ticket(scope.identity(), explicit_email);
    let requester = match &requester_email {
        Some(email) => Some(TicketRequester {
            name: args.requester.and_then(|r| r.name),
            email: Some(email.clone()),
        }),
        None => args
            .requester
            .map(|requester| TicketRequester {
                name: requester.name,
                email: requester.email.filter(|email| !email.is_empty()),
            })
            .filter(|requester| requester.name.is_some() || requester.email.is_some()),
    };

    let ticket = NewTicket {
        subject: args.subject,
        comment: args.comment,
        priority: args.priority,
        ticket_type: args.ticket_type,
        tags: args.tags,
        requester,
    };

    info!(
        parent: log,
        subject = %ticket.subject,
        requester_email = requester_email.as_deref().unwrap_or_default(),
        user_email = scope.identity().requested_email.as_deref().unwrap_or_default(),
        effective_username = %scope.identity().effective_username,
        "Creating Zendesk ticket"
    );

    let created = client.create_ticket(&ticket).await?;

    info!(
        parent: log,
        ticket_id = created.id,
        ticket_url = created.url.as_deref().unwrap_or_default(),
        "Zendesk ticket created"
    );

    ToolResultEnvelope::success(&CreateTicketResult {
        ticket: CreatedTicket {
            id: created.id,
            url: created.url,
            subject: created.subject,
            status: created.status,
            priority: created.priority,
            ticket_type: created.ticket_type,
            created_at: created.created_at,
            updated_at: created.updated_at,
            requester_email,
        },
    })
}
