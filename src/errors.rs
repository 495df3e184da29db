use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid bucket URI: {0}")]
    BucketUri(String),

    #[error("Table is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Entity API request to {endpoint} failed with status {status}: {body}")]
    EntityApi {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("TSV encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
