use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("API error: {0}")]
    Api(String),

    #[error("completion error: {0}")]
    Llm(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
