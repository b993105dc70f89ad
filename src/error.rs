use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(
        "Missing required Zendesk configuration: {}. Please set these environment variables.",
        .0.join(", ")
    )]
    MissingConfig(Vec<&'static str>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No request context found. This function must be called within a request scope.")]
    NoActiveScope,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Article not found")]
    ArticleNotFound,

    #[error("Zendesk API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Zendesk request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to encode tool result: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}
