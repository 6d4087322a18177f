//! The engines behind the four builder API operations: registration
//! broadcast, the header auction, payload redemption, and relay health
//! aggregation.

use alloy_primitives::{B256, U256};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::bid_cache::BidCache;
use crate::client::{CallClass, RelayClient, HEADER_START_TIME_UNIX_MS};
use crate::error::Error;
use crate::metrics::{self, ApiMethod};
use crate::relay::Relay;
use crate::signing::{compute_signing_root, verify_builder_signature};
use crate::slot_uid::SlotUidTracker;
use crate::types::{
    AuctionRequest, Fork, PayloadResponseProbe, SignedBlindedBeaconBlock, SignedBuilderBid,
    SignedBuilderBidEnvelope, Slot,
};

pub const PATH_STATUS: &str = "/eth/v1/builder/status";
pub const PATH_REGISTER_VALIDATOR: &str = "/eth/v1/builder/validators";
pub const PATH_GET_PAYLOAD: &str = "/eth/v1/builder/blinded_blocks";

pub fn path_get_header(auction: &AuctionRequest) -> String {
    format!(
        "/eth/v1/builder/header/{}/{:?}/{}",
        auction.slot, auction.parent_hash, auction.public_key
    )
}

/// Why a relay's header response was discarded. A rejection only ever costs
/// that relay its seat in the auction; it never fails the request.
#[derive(Debug, thiserror::Error)]
enum BidRejection {
    #[error("could not decode bid: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("envelope says {envelope} but the header is {header}")]
    VersionMismatch { envelope: Fork, header: Fork },
    #[error("bid is for slot {got}, requested {expected}")]
    WrongSlot { got: Slot, expected: Slot },
    #[error("bid is for parent hash {got}, requested {expected}")]
    WrongParentHash { got: B256, expected: B256 },
    #[error("bid is for another proposer")]
    WrongPublicKey,
    #[error("bid value is zero")]
    ZeroValue,
    #[error("bid value {value} is below the minimum {minimum}")]
    BelowMinimum { value: U256, minimum: U256 },
    #[error("invalid signature: {0}")]
    Signature(#[source] Error),
    #[error("advertised block hash {advertised} does not match the header's {enclosed}")]
    InconsistentBlockHash { advertised: B256, enclosed: B256 },
}

#[derive(Clone)]
pub struct RelayMux(Arc<RelayMuxInner>);

impl std::ops::Deref for RelayMux {
    type Target = RelayMuxInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct RelayMuxInner {
    relays: Vec<Relay>,
    relay_monitors: Vec<Url>,
    client: RelayClient,
    signing_domain: B256,
    min_bid: U256,
    relay_check: bool,
    bids: BidCache,
    slot_uid: SlotUidTracker,
}

impl RelayMux {
    pub fn new(
        relays: Vec<Relay>,
        relay_monitors: Vec<Url>,
        client: RelayClient,
        signing_domain: B256,
        min_bid: U256,
        relay_check: bool,
    ) -> Self {
        let inner = RelayMuxInner {
            relays,
            relay_monitors,
            client,
            signing_domain,
            min_bid,
            relay_check,
            bids: BidCache::default(),
            slot_uid: SlotUidTracker::new(),
        };
        Self(Arc::new(inner))
    }

    pub fn bid_cache(&self) -> &BidCache {
        &self.bids
    }

    /// Probe every relay's status endpoint and count the reachable ones.
    pub async fn check_relays(&self) -> usize {
        let checks = self.relays.iter().map(|relay| async move {
            let url = relay.endpoint(PATH_STATUS);
            match self.client.get(CallClass::Header, &url, "", None).await {
                Ok(_) => {
                    tracing::debug!(%relay, "relay status OK");
                    true
                }
                Err(err) => {
                    tracing::error!(%relay, %err, "relay status error");
                    false
                }
            }
        });
        futures::future::join_all(checks).await.into_iter().filter(|healthy| *healthy).count()
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        if !self.relay_check || self.check_relays().await > 0 {
            Ok(())
        } else {
            Err(Error::RelaysUnavailable)
        }
    }

    /// Broadcast the registration payload to every relay; succeed on the
    /// first 2xx. The raw bytes are forwarded untouched.
    pub async fn register_validators(
        &self,
        registrations: Bytes,
        count: usize,
        user_agent: &str,
    ) -> Result<(), Error> {
        let start_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis().to_string())
            .unwrap_or_default();
        let headers = vec![(HEADER_START_TIME_UNIX_MS, start_time_ms)];

        tracing::debug!(count, user_agent, "broadcasting validator registrations");

        let (result_tx, mut result_rx) = mpsc::channel(self.relays.len());
        for relay in self.relays.iter().cloned() {
            let mux = self.clone();
            let body = registrations.clone();
            let headers = headers.clone();
            let user_agent = user_agent.to_string();
            let result_tx = result_tx.clone();
            tokio::spawn(async move {
                let url = relay.endpoint(PATH_REGISTER_VALIDATOR);
                metrics::record_api_request(ApiMethod::Register, &relay.public_key);
                let result = mux
                    .client
                    .post(CallClass::Registration, &url, &user_agent, None, &headers, body)
                    .await;
                if let Err(ref err) = result {
                    if err.is_timeout() {
                        metrics::record_api_timeout(ApiMethod::Register, &relay.public_key);
                    }
                    tracing::warn!(%relay, %err, "error registering validators with relay");
                }
                let _ = result_tx.send(result.is_ok()).await;
            });
        }
        drop(result_tx);

        self.broadcast_to_monitors(registrations, headers);

        while let Some(succeeded) = result_rx.recv().await {
            if succeeded {
                return Ok(());
            }
        }
        Err(Error::NoSuccessfulRelayResponse)
    }

    /// Detached copy of the registration fan-out towards passive monitors.
    /// Outcomes are logged and nothing else.
    fn broadcast_to_monitors(&self, registrations: Bytes, headers: Vec<(&'static str, String)>) {
        for monitor in self.relay_monitors.iter().cloned() {
            let mux = self.clone();
            let body = registrations.clone();
            let headers = headers.clone();
            tokio::spawn(async move {
                let base = monitor.as_str().trim_end_matches('/');
                let url = format!("{base}{PATH_REGISTER_VALIDATOR}");
                match mux
                    .client
                    .post(CallClass::Registration, &url, "", None, &headers, body)
                    .await
                {
                    Ok(_) => tracing::debug!(%url, "sent validator registrations to relay monitor"),
                    Err(err) => {
                        tracing::warn!(%url, %err, "error calling registerValidator on relay monitor")
                    }
                }
            });
        }
    }

    /// Run the header auction: solicit every relay in parallel, wait for all
    /// of them, and pick the highest-valued validated bid. `None` means no
    /// relay produced an acceptable bid.
    pub async fn fetch_best_bid(
        &self,
        auction: &AuctionRequest,
        user_agent: &str,
    ) -> Result<Option<SignedBuilderBidEnvelope>, Error> {
        let slot_uid = self.slot_uid.advance(auction.slot).to_string();

        let (bid_tx, mut bid_rx) = mpsc::channel(self.relays.len());
        for (index, relay) in self.relays.iter().cloned().enumerate() {
            let mux = self.clone();
            let auction = auction.clone();
            let user_agent = user_agent.to_string();
            let slot_uid = slot_uid.clone();
            let bid_tx = bid_tx.clone();
            tokio::spawn(async move {
                let bid = mux.solicit_bid(&relay, &auction, &user_agent, &slot_uid).await;
                // capacity equals the relay count, the send cannot block
                let _ = bid_tx.send((index, bid)).await;
            });
        }
        drop(bid_tx);

        // Join barrier: a relay answering late may still outbid everyone, so
        // there is no early exit here.
        let mut bids = Vec::with_capacity(self.relays.len());
        while let Some((index, bid)) = bid_rx.recv().await {
            if let Some(envelope) = bid {
                bids.push((index, envelope));
            }
        }

        let Some(winner) = select_best(&bids) else {
            tracing::info!(%auction, "no bid received");
            return Ok(None);
        };
        let envelope = bids[winner].1.clone();
        let message = &envelope.data.message;

        let origin_relays: Vec<String> = origin_relay_indices(&bids, &envelope.data)
            .into_iter()
            .map(|index| self.relays[index].to_string())
            .collect();

        self.bids.insert(auction.slot, &message.block_hash, envelope.clone(), origin_relays.clone());

        tracing::info!(
            %auction,
            block_hash = %message.block_hash,
            block_number = message.block_number,
            value_wei = %message.value,
            relays = %origin_relays.join(", "),
            "best bid",
        );

        Ok(Some(envelope))
    }

    async fn solicit_bid(
        &self,
        relay: &Relay,
        auction: &AuctionRequest,
        user_agent: &str,
        slot_uid: &str,
    ) -> Option<SignedBuilderBidEnvelope> {
        let url = relay.endpoint(&path_get_header(auction));
        metrics::record_api_request(ApiMethod::GetHeader, &relay.public_key);

        let start = Instant::now();
        let response =
            match self.client.get(CallClass::Header, &url, user_agent, Some(slot_uid)).await {
                Ok(Some(response)) => response,
                Ok(None) => {
                    tracing::debug!(%relay, %auction, "no bid from relay");
                    return None;
                }
                Err(err) => {
                    if err.is_timeout() {
                        metrics::record_api_timeout(ApiMethod::GetHeader, &relay.public_key);
                    }
                    tracing::warn!(%relay, %url, %err, "error soliciting bid from relay");
                    return None;
                }
            };
        metrics::observe_api_duration(
            ApiMethod::GetHeader,
            &relay.public_key,
            start.elapsed().as_secs_f64(),
        );

        match self.validate_bid(relay, &response, auction) {
            Ok(envelope) => Some(envelope),
            Err(rejection) => {
                metrics::record_invalid_bid(&relay.public_key);
                tracing::warn!(%relay, %auction, %rejection, "rejecting bid");
                None
            }
        }
    }

    fn validate_bid(
        &self,
        relay: &Relay,
        response: &[u8],
        auction: &AuctionRequest,
    ) -> Result<SignedBuilderBidEnvelope, BidRejection> {
        let envelope: SignedBuilderBidEnvelope =
            serde_json::from_slice(response).map_err(BidRejection::Decode)?;
        let bid = &envelope.data;
        let message = &bid.message;

        let header_version = message.header.version();
        if envelope.version != header_version {
            return Err(BidRejection::VersionMismatch {
                envelope: envelope.version,
                header: header_version,
            });
        }
        if message.slot != auction.slot {
            return Err(BidRejection::WrongSlot { got: message.slot, expected: auction.slot });
        }
        if message.parent_hash != auction.parent_hash {
            return Err(BidRejection::WrongParentHash {
                got: message.parent_hash,
                expected: auction.parent_hash,
            });
        }
        if message.public_key != auction.public_key {
            return Err(BidRejection::WrongPublicKey);
        }
        if message.value.is_zero() {
            return Err(BidRejection::ZeroValue);
        }
        if message.value < self.min_bid {
            return Err(BidRejection::BelowMinimum {
                value: message.value,
                minimum: self.min_bid,
            });
        }

        let signing_root = compute_signing_root(message, self.signing_domain);
        verify_builder_signature(signing_root, &bid.signature, &relay.public_key)
            .map_err(BidRejection::Signature)?;

        let enclosed = *message.header.block_hash();
        if enclosed != message.block_hash {
            return Err(BidRejection::InconsistentBlockHash {
                advertised: message.block_hash,
                enclosed,
            });
        }

        Ok(envelope)
    }

    /// Redeem a signed blinded block for the full execution payload. The
    /// first relay returning a payload for the right block wins and the
    /// rest are cancelled; the winning response bytes are passed through
    /// verbatim.
    pub async fn open_bid(&self, raw_block: Bytes, user_agent: &str) -> Result<Bytes, Error> {
        let block = SignedBlindedBeaconBlock::from_json(&raw_block)?;
        let slot = block.slot();
        let block_hash = *block.block_hash();
        let version = block.version();
        let slot_uid = self.slot_uid.current().map(|uid| uid.to_string());

        tracing::debug!(slot, %block_hash, %version, "redeeming bid");

        // The cache is advisory: a miss still forwards the block, it just
        // cannot name origin relays if every relay withholds.
        let remembered = self.bids.get(slot, &block_hash);
        if remembered.is_none() {
            tracing::warn!(slot, %block_hash, "no remembered bid for this block hash");
        }

        let cancel = CancellationToken::new();
        let (payload_tx, mut payload_rx) = mpsc::channel(self.relays.len());
        for relay in self.relays.iter().cloned() {
            let mux = self.clone();
            let body = raw_block.clone();
            let user_agent = user_agent.to_string();
            let slot_uid = slot_uid.clone();
            let cancel = cancel.clone();
            let payload_tx = payload_tx.clone();
            tokio::spawn(async move {
                let payload = tokio::select! {
                    _ = cancel.cancelled() => None,
                    payload = mux.redeem_from_relay(
                        &relay,
                        body,
                        &user_agent,
                        slot_uid.as_deref(),
                        &block_hash,
                    ) => payload,
                };
                let _ = payload_tx.send(payload).await;
            });
        }
        drop(payload_tx);

        while let Some(payload) = payload_rx.recv().await {
            if let Some(payload) = payload {
                cancel.cancel();
                tracing::info!(slot, %block_hash, "returning payload");
                return Ok(payload);
            }
        }

        if let Some(remembered) = remembered {
            for origin in &remembered.origin_relays {
                metrics::record_withholding(origin);
            }
            tracing::error!(
                slot,
                %block_hash,
                relays_with_bid = %remembered.origin_relays.join(", "),
                "no payload received from relay!",
            );
        }
        Err(Error::NoSuccessfulRelayResponse)
    }

    async fn redeem_from_relay(
        &self,
        relay: &Relay,
        body: Bytes,
        user_agent: &str,
        slot_uid: Option<&str>,
        expected_block_hash: &B256,
    ) -> Option<Bytes> {
        let url = relay.endpoint(PATH_GET_PAYLOAD);
        metrics::record_api_request(ApiMethod::GetPayload, &relay.public_key);

        let start = Instant::now();
        let response = match self
            .client
            .post(CallClass::Payload, &url, user_agent, slot_uid, &[], body)
            .await
        {
            Ok(Some(response)) => response,
            Ok(None) => {
                tracing::warn!(%relay, "no payload in relay response");
                return None;
            }
            Err(err) => {
                if err.is_timeout() {
                    metrics::record_api_timeout(ApiMethod::GetPayload, &relay.public_key);
                }
                tracing::warn!(%relay, %url, %err, "error retrieving payload from relay");
                return None;
            }
        };
        metrics::observe_api_duration(
            ApiMethod::GetPayload,
            &relay.public_key,
            start.elapsed().as_secs_f64(),
        );

        let probe: PayloadResponseProbe = match serde_json::from_slice(&response) {
            Ok(probe) => probe,
            Err(err) => {
                tracing::warn!(%relay, %err, "could not decode payload response");
                return None;
            }
        };
        if probe.is_empty() {
            tracing::warn!(%relay, "empty payload in relay response");
            return None;
        }
        match probe.block_hash() {
            Some(block_hash) if block_hash == *expected_block_hash => Some(response),
            block_hash => {
                tracing::warn!(
                    %relay,
                    ?block_hash,
                    %expected_block_hash,
                    "payload block hash does not match the requested bid",
                );
                None
            }
        }
    }
}

/// Position of the winning bid: largest value, exact ties broken by the
/// lexicographically smallest block hash so the outcome is independent of
/// arrival order.
fn select_best(bids: &[(usize, SignedBuilderBidEnvelope)]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (position, (_, envelope)) in bids.iter().enumerate() {
        let candidate = &envelope.data.message;
        let replace = match best {
            None => true,
            Some(current) => {
                let current = &bids[current].1.data.message;
                candidate.value > current.value
                    || (candidate.value == current.value
                        && candidate.block_hash < current.block_hash)
            }
        };
        if replace {
            best = Some(position);
        }
    }
    best
}

/// Every relay whose bid matched the winner's (block hash, value) pair owes
/// the payload during redemption.
fn origin_relay_indices(
    bids: &[(usize, SignedBuilderBidEnvelope)],
    winner: &SignedBuilderBid,
) -> Vec<usize> {
    bids.iter()
        .filter(|(_, envelope)| {
            let message = &envelope.data.message;
            message.block_hash == winner.message.block_hash
                && message.value == winner.message.value
        })
        .map(|(index, _)| *index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BlsPublicKey, BlsSignature, BuilderBid, ExecutionPayloadHeader,
        ExecutionPayloadHeaderCapella, VersionedValue,
    };

    fn bid(block_hash: B256, value: u64) -> SignedBuilderBidEnvelope {
        let header = ExecutionPayloadHeaderCapella { block_hash, ..Default::default() };
        VersionedValue {
            version: Fork::Capella,
            data: SignedBuilderBid {
                message: BuilderBid {
                    slot: 100,
                    parent_hash: B256::ZERO,
                    block_hash,
                    public_key: BlsPublicKey::default(),
                    block_number: 1,
                    transactions_root: B256::ZERO,
                    value: U256::from(value),
                    header: ExecutionPayloadHeader::Capella(header),
                },
                signature: BlsSignature::default(),
            },
        }
    }

    #[test]
    fn selection_keeps_the_largest_value() {
        let bids = vec![
            (0, bid(B256::repeat_byte(0x01), 1)),
            (1, bid(B256::repeat_byte(0x02), 3)),
            (2, bid(B256::repeat_byte(0x03), 2)),
        ];
        let winner = select_best(&bids).unwrap();
        assert_eq!(bids[winner].0, 1);
    }

    #[test]
    fn exact_ties_break_on_smallest_block_hash() {
        let bids = vec![
            (0, bid(B256::repeat_byte(0x0b), 3)),
            (1, bid(B256::repeat_byte(0x0a), 3)),
            (2, bid(B256::repeat_byte(0x0c), 3)),
        ];
        let winner = select_best(&bids).unwrap();
        assert_eq!(bids[winner].0, 1);

        // arrival order must not matter
        let mut reversed = bids.clone();
        reversed.reverse();
        let winner = select_best(&reversed).unwrap();
        assert_eq!(reversed[winner].0, 1);
    }

    #[test]
    fn identical_winning_bids_share_origin() {
        let shared = B256::repeat_byte(0x0a);
        let bids = vec![
            (0, bid(shared, 3)),
            (1, bid(B256::repeat_byte(0x0b), 3)),
            (2, bid(shared, 3)),
        ];
        let winner = select_best(&bids).unwrap();
        let origins = origin_relay_indices(&bids, &bids[winner].1.data);
        assert_eq!(origins, vec![0, 2]);
    }

    #[test]
    fn no_bids_means_no_winner() {
        assert!(select_best(&[]).is_none());
    }
}
