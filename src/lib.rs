use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptSearchError>;

#[derive(Error, Debug)]
pub enum ScriptSearchError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid id: {0} (must be a positive integer)")]
    InvalidId(i64),

    #[error("search query must not be empty")]
    InvalidQuery,

    #[error("top_n must be greater than zero")]
    InvalidTopN,

    #[error("embedding input must not be empty")]
    EmptyInput,

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod extractor;
pub mod search;
pub mod seeder;
