use thiserror::Error;

/// Anything that went wrong while calling the remote chat API.
#[derive(Debug, Error)]
pub enum RemoteCallFailure {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A submission that never became a turn.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnRejected {
    #[error("message is empty")]
    EmptyInput,
    #[error("still waiting for the previous reply")]
    Busy,
    #[error("no API key configured")]
    MissingApiKey,
}
