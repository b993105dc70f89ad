use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub url: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub author_id: Option<u64>,
    pub section_id: Option<u64>,
    pub promoted: Option<bool>,
    pub position: Option<i64>,
    pub label_names: Option<Vec<String>>,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleSearchParams {
    pub query: String,
    pub locale: String,
    pub per_page: u32,
    pub page: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleSearchResponse {
    #[serde(default)]
    pub results: Vec<Article>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShowArticleResponse {
    #[serde(default)]
    pub article: Option<Article>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Problem,
    Incident,
    Question,
    Task,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketComment {
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketRequester {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTicket {
    pub subject: String,
    pub comment: TicketComment,
    pub priority: TicketPriority,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<TicketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<TicketRequester>,
}

#[derive(Debug, Serialize)]
pub struct CreateTicketRequest<'a> {
    pub ticket: &'a NewTicket,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub url: Option<String>,
    pub subject: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TicketResponse {
    pub ticket: Ticket,
}
