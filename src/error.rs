// ABOUTME: Error taxonomy with structured exit codes for CLI
// ABOUTME: One closed enum covers API, template, settings and vault failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    InvalidToken(String),

    #[error("There was an error with the following request: {url}\n{status}: {status_text}")]
    Client {
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("There was an error with the following request: {url}\n{status}: {status_text}")]
    Server {
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("There was an error with the following request: {url}\n{status}: {status_text}")]
    Unidentified {
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("Rate limit still in effect after {attempts} attempts: {url}")]
    RetryBudgetExhausted { url: String, attempts: u32 },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidToken(_) => 2,
            Error::Network(_) => 3,
            Error::Client { .. } => 4,
            Error::Server { .. } => 5,
            Error::Unidentified { .. } => 6,
            Error::RetryBudgetExhausted { .. } => 7,
            Error::Parse(_) => 8,
            Error::Template(_) => 9,
            Error::Filesystem(_) => 10,
            Error::Config(_) => 11,
        }
    }

    /// HTTP status for errors produced by a failed API response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Client { status, .. }
            | Error::Server { status, .. }
            | Error::Unidentified { status, .. } => Some(*status),
            Error::RetryBudgetExhausted { .. } => Some(429),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidToken("test".into()).exit_code(), 2);
        assert_eq!(
            Error::Client {
                url: "https://readwise.io/api/v2/export/".into(),
                status: 404,
                status_text: "Not Found".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::Template("test".into()).exit_code(), 9);
    }

    #[test]
    fn test_http_error_message_names_url_and_status() {
        let err = Error::Server {
            url: "https://readwise.io/api/v2/export/".into(),
            status: 500,
            status_text: "Internal Server Error".into(),
        };
        assert_eq!(
            err.to_string(),
            "There was an error with the following request: https://readwise.io/api/v2/export/\n500: Internal Server Error"
        );
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_invalid_token_message_is_verbatim() {
        let err = Error::InvalidToken("token invalid".into());
        assert_eq!(err.to_string(), "token invalid");
        assert_eq!(err.status(), None);
    }
}
