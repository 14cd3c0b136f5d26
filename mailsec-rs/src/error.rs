use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailSecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// No matching record was published. The message is shown as-is to the caller.
    #[error("{0}")]
    NotFound(String),

    #[error("DNS lookup failed: {0}")]
    DnsLookup(String),

    #[error("Invalid record: {0}")]
    Parse(String),

    #[error("Verifier error: {0}")]
    Verifier(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MailSecError {
    /// True when the lookup succeeded but nothing matching was published
    pub fn is_not_found(&self) -> bool {
        matches!(self, MailSecError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MailSecError>;
