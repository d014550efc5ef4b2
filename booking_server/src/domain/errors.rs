use thiserror::Error;

// Failures while minting a signed token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is not configured")]
    MissingSecret,
    #[error("failed to encode token payload: {0}")]
    Encode(#[from] serde_json::Error),
}

// Domain-level errors for admin auth workflows.
#[derive(Debug, Error)]
pub enum AuthError {
    // Covers malformed, forged and expired tokens alike.
    #[error("invalid admin token")]
    InvalidToken,
    #[error("malformed login request")]
    MalformedRequest,
    #[error(transparent)]
    Signing(#[from] TokenError),
}

// Failures talking to the external document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store transport error: {0}")]
    Transport(String),
    #[error("document store returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("document store response decode error: {0}")]
    Decode(String),
    #[error("invalid resource identifier: {0}")]
    InvalidResource(String),
}

// Errors surfaced by the booking use cases.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("booking not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}
