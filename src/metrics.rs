use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramOpts, HistogramVec, IntCounterVec,
    Opts, DEFAULT_BUCKETS,
};

use crate::types::BlsPublicKey;

const NAMESPACE: &str = "boost_mux";
const SUBSYSTEM: &str = "relay";

const API_METHOD_LABEL: &str = "method";
const RELAY_LABEL: &str = "relay";

#[derive(Copy, Clone, Debug)]
pub enum ApiMethod {
    Register,
    GetHeader,
    GetPayload,
}

impl ApiMethod {
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Register => "register",
            Self::GetHeader => "get_header",
            Self::GetPayload => "get_payload",
        }
    }
}

lazy_static! {
    static ref API_REQUESTS_COUNTER: IntCounterVec = register_int_counter_vec!(
        Opts::new("api_requests_total", "total number of builder API requests")
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        &[API_METHOD_LABEL, RELAY_LABEL]
    )
    .unwrap();
    static ref API_TIMEOUT_COUNTER: IntCounterVec = register_int_counter_vec!(
        Opts::new("api_timeouts_total", "total number of builder API timeouts")
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        &[API_METHOD_LABEL, RELAY_LABEL]
    )
    .unwrap();
    static ref API_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        HistogramOpts {
            common_opts: Opts::new(
                "api_request_duration_seconds",
                "duration (in seconds) of builder API requests"
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            buckets: DEFAULT_BUCKETS.to_vec(),
        },
        &[API_METHOD_LABEL, RELAY_LABEL]
    )
    .unwrap();
    static ref AUCTION_INVALID_BIDS_COUNTER: IntCounterVec = register_int_counter_vec!(
        Opts::new("auction_invalid_bids_total", "total number of rejected relay bids")
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        &[RELAY_LABEL]
    )
    .unwrap();
    static ref PAYLOAD_WITHHOLDING_COUNTER: IntCounterVec = register_int_counter_vec!(
        Opts::new(
            "payload_withholding_total",
            "total number of withheld payloads per origin relay"
        )
        .namespace(NAMESPACE)
        .subsystem(SUBSYSTEM),
        &[RELAY_LABEL]
    )
    .unwrap();
}

pub fn record_api_request(method: ApiMethod, relay: &BlsPublicKey) {
    API_REQUESTS_COUNTER.with_label_values(&[method.as_str(), &relay.to_string()]).inc();
}

pub fn record_api_timeout(method: ApiMethod, relay: &BlsPublicKey) {
    API_TIMEOUT_COUNTER.with_label_values(&[method.as_str(), &relay.to_string()]).inc();
}

pub fn observe_api_duration(method: ApiMethod, relay: &BlsPublicKey, seconds: f64) {
    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[method.as_str(), &relay.to_string()])
        .observe(seconds);
}

pub fn record_invalid_bid(relay: &BlsPublicKey) {
    AUCTION_INVALID_BIDS_COUNTER.with_label_values(&[&relay.to_string()]).inc();
}

pub fn record_withholding(origin_relay: &str) {
    PAYLOAD_WITHHOLDING_COUNTER.with_label_values(&[origin_relay]).inc();
}
