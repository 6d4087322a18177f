use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, IntoMakeService},
    Json, Router,
};
use bytes::Bytes;
use hyper::server::conn::AddrIncoming;
use std::net::{Ipv4Addr, SocketAddr};

use crate::error::Error;
use crate::relay_mux::RelayMux;
use crate::types::{AuctionRequest, BlsPublicKey, SignedValidatorRegistration};

/// Type alias for the configured axum server
pub type BoostServer = axum::Server<AddrIncoming, IntoMakeService<Router>>;

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

async fn handle_status_check(
    State(mux): State<RelayMux>,
) -> Result<Json<serde_json::Value>, Error> {
    mux.health_check().await?;
    Ok(Json(serde_json::json!({})))
}

async fn handle_validator_registration(
    State(mux): State<RelayMux>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, Error> {
    let registrations: Vec<SignedValidatorRegistration> =
        serde_json::from_slice(&body).map_err(Error::InvalidRegistrations)?;
    tracing::trace!(count = registrations.len(), "processing validator registrations");
    mux.register_validators(body, registrations.len(), &user_agent(&headers)).await?;
    Ok(Json(serde_json::json!({})))
}

async fn handle_fetch_bid(
    State(mux): State<RelayMux>,
    Path((slot, parent_hash, public_key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let auction = AuctionRequest {
        slot: slot.parse().map_err(|_| Error::InvalidSlot)?,
        parent_hash: parent_hash.parse().map_err(|_| Error::InvalidHash)?,
        public_key: public_key.parse::<BlsPublicKey>()?,
    };

    match mux.fetch_best_bid(&auction, &user_agent(&headers)).await? {
        Some(envelope) => {
            tracing::trace!(%auction, bid = %envelope.data, "returning bid");
            Ok(Json(envelope).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn handle_open_bid(
    State(mux): State<RelayMux>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    let payload = mux.open_bid(body, &user_agent(&headers)).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], payload).into_response())
}

pub struct Server {
    host: Ipv4Addr,
    port: u16,
    mux: RelayMux,
}

impl Server {
    pub fn new(host: Ipv4Addr, port: u16, mux: RelayMux) -> Self {
        Self { host, port, mux }
    }

    /// Configures and returns the axum server
    pub fn serve(&self) -> Result<BoostServer, Error> {
        let router = Router::new()
            .route("/", get(handle_root))
            .route("/eth/v1/builder/status", get(handle_status_check))
            .route("/eth/v1/builder/validators", post(handle_validator_registration))
            .route("/eth/v1/builder/header/:slot/:parent_hash/:pubkey", get(handle_fetch_bid))
            .route("/eth/v1/builder/blinded_blocks", post(handle_open_bid))
            .with_state(self.mux.clone());
        let addr = SocketAddr::from((self.host, self.port));
        Ok(axum::Server::try_bind(&addr)?.serve(router.into_make_service()))
    }

}
