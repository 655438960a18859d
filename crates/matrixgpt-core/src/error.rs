use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixGptError {
    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Matrix API error: HTTP {status} {body}")]
    MatrixApi { status: u16, body: String },

    #[error("Matrix response error: {0}")]
    MatrixResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}
