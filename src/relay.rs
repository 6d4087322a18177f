use std::collections::HashSet;
use std::fmt;
use url::Url;

use crate::error::Error;
use crate::types::BlsPublicKey;

/// A relay as configured: its base URL carries the expected signer public
/// key in the username position, `https://0x<pubkey>@relay.example.org`.
#[derive(Clone, Debug)]
pub struct RelayEndpoint {
    url: Url,
    public_key: BlsPublicKey,
}

impl TryFrom<Url> for RelayEndpoint {
    type Error = Error;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        if url.username().is_empty() {
            return Err(Error::RelayPublicKeyMissing(url));
        }
        let public_key = url.username().parse()?;
        Ok(Self { url, public_key })
    }
}

impl fmt::Display for RelayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// One member of the relay directory. Identity is the public key; the
/// stored endpoint has the credential part stripped so it can be used as an
/// outbound base URL directly.
#[derive(Clone)]
pub struct Relay {
    endpoint: Url,
    pub public_key: BlsPublicKey,
}

impl Relay {
    /// Compose the outbound URL for one of the canonical builder API paths.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.endpoint.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("public_key", &self.public_key)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint.as_str())
    }
}

impl From<RelayEndpoint> for Relay {
    fn from(value: RelayEndpoint) -> Self {
        let RelayEndpoint { url, public_key } = value;
        let mut endpoint = url;
        let _ = endpoint.set_username("");
        let _ = endpoint.set_password(None);
        Self { endpoint, public_key }
    }
}

/// Build the immutable relay directory, rejecting an empty set and any two
/// relays that share a public key.
pub fn build_directory(endpoints: Vec<RelayEndpoint>) -> Result<Vec<Relay>, Error> {
    if endpoints.is_empty() {
        return Err(Error::NoRelays);
    }

    let mut seen = HashSet::new();
    let mut relays = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let relay = Relay::from(endpoint);
        if !seen.insert(relay.public_key.clone()) {
            return Err(Error::DuplicateRelay(relay.public_key));
        }
        relays.push(relay);
    }
    Ok(relays)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELAY_URL: &str = "https://0x845bd072b7cd566f02faeb0a4033ce9399e42839ced64e8b2adcfc859ed1e8e1a5a293336a49feac6d9a5edb779be53a@boost-relay-sepolia.flashbots.net";

    #[test]
    fn parse_relay_endpoint() {
        let url = Url::parse(RELAY_URL).unwrap();
        let endpoint = RelayEndpoint::try_from(url.clone()).unwrap();
        assert_eq!(endpoint.url, url);
        assert_eq!(
            endpoint.public_key.to_string(),
            "0x845bd072b7cd566f02faeb0a4033ce9399e42839ced64e8b2adcfc859ed1e8e1a5a293336a49feac6d9a5edb779be53a",
        );
    }

    #[test]
    fn parse_relay_endpoint_missing_public_key() {
        let url = Url::parse("https://relay.com").unwrap();
        assert!(matches!(
            RelayEndpoint::try_from(url),
            Err(Error::RelayPublicKeyMissing(_))
        ));
    }

    #[test]
    fn outbound_urls_drop_the_credential_part() {
        let url = Url::parse(RELAY_URL).unwrap();
        let relay = Relay::from(RelayEndpoint::try_from(url).unwrap());
        assert_eq!(
            relay.endpoint("/eth/v1/builder/status"),
            "https://boost-relay-sepolia.flashbots.net/eth/v1/builder/status",
        );
    }

    #[test]
    fn directory_rejects_duplicates_and_empty() {
        assert!(matches!(build_directory(vec![]), Err(Error::NoRelays)));

        let url = Url::parse(RELAY_URL).unwrap();
        let first = RelayEndpoint::try_from(url.clone()).unwrap();
        let second = RelayEndpoint::try_from(url).unwrap();
        assert!(matches!(
            build_directory(vec![first, second]),
            Err(Error::DuplicateRelay(_))
        ));
    }
}
