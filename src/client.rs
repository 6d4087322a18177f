//! Outbound HTTP plumbing. One pooled client per call class so a slow
//! payload fetch can never starve the header path of connections or widen
//! its deadline.

use bytes::Bytes;
use reqwest::{header, redirect, Client, Method, StatusCode};
use std::time::Duration;
use thiserror::Error;

pub const SERVICE_USER_AGENT: &str = concat!("boost-mux/", env!("CARGO_PKG_VERSION"));

/// Correlation id for one proposer duty, stamped on every outbound call.
pub const HEADER_SLOT_UID: &str = "x-slot-uid";
/// Stamped on registration fan-out with the dispatch start time.
pub const HEADER_START_TIME_UNIX_MS: &str = "x-start-time-unix-ms";

const ERROR_BODY_EXCERPT_LIMIT: usize = 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("redirect refused (status {0})")]
    RedirectRefused(u16),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500,
            Self::RedirectRefused(_) => false,
        }
    }
}

/// Which timeout budget an outbound call draws from.
#[derive(Debug, Clone, Copy)]
pub enum CallClass {
    Header,
    Payload,
    Registration,
}

pub struct RelayClient {
    header: Client,
    payload: Client,
    registration: Client,
    max_retries: u32,
}

impl RelayClient {
    pub fn new(
        header_timeout: Duration,
        payload_timeout: Duration,
        registration_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            header: build_client(header_timeout)?,
            payload: build_client(payload_timeout)?,
            registration: build_client(registration_timeout)?,
            max_retries,
        })
    }

    fn class(&self, class: CallClass) -> &Client {
        match class {
            CallClass::Header => &self.header,
            CallClass::Payload => &self.payload,
            CallClass::Registration => &self.registration,
        }
    }

    /// Idempotent GET with bounded retries and exponential backoff.
    /// `Ok(None)` means the upstream answered 204 No Content.
    pub async fn get(
        &self,
        class: CallClass,
        url: &str,
        user_agent: &str,
        slot_uid: Option<&str>,
    ) -> Result<Option<Bytes>, ClientError> {
        let client = self.class(class);
        let mut attempt: u32 = 0;
        loop {
            let result =
                send(client, Method::GET, url, user_agent, slot_uid, &[], None).await;
            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(100 * (1 << attempt))).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// POST, attempted exactly once. `Ok(None)` means 204 No Content.
    pub async fn post(
        &self,
        class: CallClass,
        url: &str,
        user_agent: &str,
        slot_uid: Option<&str>,
        extra_headers: &[(&'static str, String)],
        body: Bytes,
    ) -> Result<Option<Bytes>, ClientError> {
        send(self.class(class), Method::POST, url, user_agent, slot_uid, extra_headers, Some(body))
            .await
    }
}

fn build_client(timeout: Duration) -> Result<Client, ClientError> {
    // A 3xx from a relay is a protocol violation; never follow it.
    Ok(Client::builder().timeout(timeout).redirect(redirect::Policy::none()).build()?)
}

fn compose_user_agent(caller: &str) -> String {
    if caller.is_empty() {
        SERVICE_USER_AGENT.to_string()
    } else {
        format!("{SERVICE_USER_AGENT} {caller}")
    }
}

fn classify(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Http(err)
    }
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    user_agent: &str,
    slot_uid: Option<&str>,
    extra_headers: &[(&'static str, String)],
    body: Option<Bytes>,
) -> Result<Option<Bytes>, ClientError> {
    let mut request = client
        .request(method, url)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, compose_user_agent(user_agent));
    if let Some(uid) = slot_uid {
        request = request.header(HEADER_SLOT_UID, uid);
    }
    for (name, value) in extra_headers {
        request = request.header(*name, value);
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    let response = request.send().await.map_err(classify)?;
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if status.is_redirection() {
        return Err(ClientError::RedirectRefused(status.as_u16()));
    }
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let excerpt = body[..body.len().min(ERROR_BODY_EXCERPT_LIMIT)].to_vec();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&excerpt).into_owned(),
        });
    }
    response.bytes().await.map(Some).map_err(classify)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_is_prefixed_with_our_own() {
        assert_eq!(compose_user_agent(""), SERVICE_USER_AGENT);
        assert_eq!(
            compose_user_agent("lighthouse/v5.1.0"),
            format!("{SERVICE_USER_AGENT} lighthouse/v5.1.0"),
        );
    }

    #[test]
    fn retry_policy() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!ClientError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!ClientError::RedirectRefused(302).is_retryable());
    }
}
