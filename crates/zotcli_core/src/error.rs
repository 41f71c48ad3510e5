use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZoteroError>;

/// Error taxonomy for talking to the Zotero Web API.
///
/// Display strings are the user-facing category messages; the server's own
/// message text is appended when one was returned.
#[derive(Debug, Error)]
pub enum ZoteroError {
    #[error("Zotero API rate limit exceeded. Please try again later.{}", detail_suffix(.detail))]
    RateLimit {
        retry_after: Option<u64>,
        detail: Option<String>,
    },
    #[error("Invalid or missing Zotero API key.{}", detail_suffix(.detail))]
    InvalidApiKey { detail: Option<String> },
    #[error(
        "Access forbidden. Check API key permissions or resource access rights.{}",
        detail_suffix(.detail)
    )]
    Forbidden { detail: Option<String> },
    #[error("The requested resource was not found.{}", detail_suffix(.detail))]
    NotFound { detail: Option<String> },
    #[error("Bad request. Check parameters and data format.{}", detail_suffix(.detail))]
    BadRequest { detail: Option<String> },
    #[error("Write conflict. The target changed on the server.{}", detail_suffix(.detail))]
    Conflict { detail: Option<String> },
    #[error(
        "Precondition failed. The provided library version is outdated or the object \
         changed on the server.{}",
        detail_suffix(.detail)
    )]
    PreconditionFailed { detail: Option<String> },
    #[error(
        "Precondition required. This write needs a known library version.{}",
        detail_suffix(.detail)
    )]
    PreconditionRequired { detail: Option<String> },
    #[error("A Zotero server error occurred (HTTP {status}). Please try again later.{}", detail_suffix(.detail))]
    Server { status: u16, detail: Option<String> },
    #[error("Unexpected HTTP status {status} from the Zotero API.{}", detail_suffix(.detail))]
    Unexpected { status: u16, detail: Option<String> },
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Request retry budget exhausted while talking to the Zotero API")]
    RetryBudgetExhausted,
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to decode API payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZoteroError {
    /// Map a non-success HTTP response to an error category.
    ///
    /// 403 means "bad key" when no key was sent at all, otherwise the key
    /// lacks access to the resource.
    pub fn from_status(status: StatusCode, body: &str, key_present: bool) -> Self {
        let detail = normalized_detail(body);
        match status.as_u16() {
            400 => Self::BadRequest { detail },
            401 => Self::InvalidApiKey { detail },
            403 => {
                if key_present {
                    Self::Forbidden { detail }
                } else {
                    Self::InvalidApiKey { detail }
                }
            }
            404 => Self::NotFound { detail },
            409 => Self::Conflict { detail },
            412 => Self::PreconditionFailed { detail },
            428 => Self::PreconditionRequired { detail },
            429 => Self::RateLimit {
                retry_after: None,
                detail,
            },
            status if (500..600).contains(&status) => Self::Server { status, detail },
            other => Self::Unexpected {
                status: other,
                detail,
            },
        }
    }

    /// True for statuses worth retrying with backoff.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        status.as_u16() == 429 || status.is_server_error()
    }
}

fn normalized_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Server bodies are short plain-text sentences; keep them bounded.
    let mut detail = trimmed.chars().take(300).collect::<String>();
    if detail.len() < trimmed.len() {
        detail.push_str("...");
    }
    Some(detail)
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" (Details: {detail})"),
        None => String::new(),
    }
}
