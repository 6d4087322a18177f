use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::types::BlsPublicKey;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no relays")]
    NoRelays,
    #[error("duplicate relay for public key {0}")]
    DuplicateRelay(BlsPublicKey),
    #[error("invalid slot")]
    InvalidSlot,
    #[error("invalid hash")]
    InvalidHash,
    #[error("invalid pubkey")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid secret key material")]
    InvalidSecretKey,
    #[error("signature does not verify")]
    SignatureMismatch,
    #[error("unrecognized fork version {0}")]
    InvalidForkVersion(String),
    #[error("could not decode signed blinded beacon block: {0}")]
    InvalidBlindedBlock(#[source] serde_json::Error),
    #[error("could not decode validator registrations: {0}")]
    InvalidRegistrations(#[source] serde_json::Error),
    #[error("no successful relay response")]
    NoSuccessfulRelayResponse,
    #[error("all relays are unavailable")]
    RelaysUnavailable,
    #[error("server already running")]
    ServerAlreadyRunning,
    #[error("unable to parse relay URL {0}")]
    RelayUrl(String),
    #[error("relay URL {0} does not embed a public key")]
    RelayPublicKeyMissing(Url),
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    Client(#[from] crate::client::ClientError),
}

/// JSON error body returned to the consensus client.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSlot
            | Self::InvalidHash
            | Self::InvalidPublicKey
            | Self::InvalidSignature
            | Self::InvalidForkVersion(_)
            | Self::InvalidBlindedBlock(_)
            | Self::InvalidRegistrations(_) => StatusCode::BAD_REQUEST,
            Self::NoSuccessfulRelayResponse => StatusCode::BAD_GATEWAY,
            Self::RelaysUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let body = ErrorBody { code: code.as_u16(), message: self.to_string() };
        (code, Json(body)).into_response()
    }
}
