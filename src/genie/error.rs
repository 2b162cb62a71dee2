use thiserror::Error;

/// Errors talking to a Genie space.
#[derive(Error, Debug)]
pub enum GenieError {
    #[error("Genie is not configured: {0}")]
    NotConfigured(String),

    #[error("Cannot connect to Databricks at {0}")]
    Connect(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to send request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Genie API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode Genie response: {0}")]
    Decode(String),

    #[error("Genie response is missing {0}")]
    MissingId(&'static str),

    #[error("Genie message ended with status {status}: {detail}")]
    MessageFailed { status: String, detail: String },

    #[error("Genie message not completed after {0} polls")]
    PollExhausted(usize),
}
